//! Eviction pass execution.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{JanitorRun, JanitorState, JanitorStats, JanitorStatus};
use crate::metrics;
use crate::store::{RecordStore, RetentionPolicy};

/// Reported in [`JanitorRun::error`]; the cause goes to the log only.
pub const PASS_FAILED_MESSAGE: &str = "Eviction failed";

/// Periodic eviction of stale records.
///
/// At most one pass runs at a time. A trigger that arrives while a pass is in
/// progress is dropped, not queued.
pub struct Janitor {
    store: RecordStore,
    policy: RetentionPolicy,
    schedule: String,
    running: AtomicBool,
    stats: RwLock<JanitorStats>,
}

/// Clears the running flag when the pass ends, including on panic.
pub(crate) struct PassGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Janitor {
    pub fn new(store: RecordStore, policy: RetentionPolicy, schedule: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            schedule: schedule.into(),
            running: AtomicBool::new(false),
            stats: RwLock::new(JanitorStats::default()),
        }
    }

    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn schedule(&self) -> &str {
        &self.schedule
    }

    pub fn state(&self) -> JanitorState {
        if self.running.load(Ordering::Acquire) {
            JanitorState::Running
        } else {
            JanitorState::Idle
        }
    }

    /// Moves Idle to Running. `None` if a pass already holds the flag.
    pub(crate) fn try_begin(&self) -> Option<PassGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                running: &self.running,
            })
    }

    /// Runs one eviction pass against `now`.
    ///
    /// Returns `None` when skipped because another pass is running. Storage
    /// failures are logged, recorded in the returned run as
    /// [`PASS_FAILED_MESSAGE`] and never propagated.
    pub async fn run_pass(&self, now: DateTime<Utc>, manual: bool) -> Option<JanitorRun> {
        let Some(_guard) = self.try_begin() else {
            self.stats.write().await.skipped_count += 1;
            metrics::record_janitor_pass("skipped", 0, 0.0);
            tracing::warn!(manual, "Janitor pass already running, trigger skipped");
            return None;
        };

        let started_at = Utc::now();
        let start = std::time::Instant::now();
        let cutoff = self.policy.cutoff(now);

        tracing::debug!(cutoff = %cutoff, manual, "Janitor pass started");
        let result = self.store.delete_older_than_async(self.policy, now).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;

        let (evicted, error) = match result {
            Ok(evicted) => {
                tracing::info!(deleted = evicted, cutoff = %cutoff, duration_ms, manual, "Janitor pass completed");
                (evicted, None)
            },
            Err(e) => {
                tracing::error!(error = %e, cutoff = %cutoff, manual, "Janitor pass failed");
                (0, Some(PASS_FAILED_MESSAGE.to_string()))
            },
        };

        let run = JanitorRun {
            id: Uuid::new_v4().to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_ms,
            cutoff,
            evicted,
            success: error.is_none(),
            error,
            manual,
        };

        #[allow(clippy::cast_precision_loss)]
        let duration_secs = duration_ms as f64 / 1000.0;
        metrics::record_janitor_pass(
            if run.success { "success" } else { "failure" },
            evicted,
            duration_secs,
        );

        self.stats.write().await.record(&run);
        Some(run)
    }

    /// Current status and recent history.
    pub async fn status(&self) -> JanitorStatus {
        let stats = self.stats.read().await;
        JanitorStatus {
            state: self.state(),
            schedule: self.schedule.clone(),
            retention_secs: self.policy.window_secs(),
            pass_count: stats.pass_count,
            success_count: stats.success_count,
            failure_count: stats.failure_count,
            skipped_count: stats.skipped_count,
            evicted_total: stats.evicted_total,
            history: stats.history.iter().rev().cloned().collect(),
        }
    }
}
