//! Type definitions for the janitor.
//!
//! Contains the pass record, the reported status and the internal counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of passes kept in the in-memory history.
pub const MAX_HISTORY_ENTRIES: usize = 20;

/// Whether a pass is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JanitorState {
    Idle,
    Running,
}

/// Result of one eviction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JanitorRun {
    /// Unique pass ID.
    pub id: String,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub completed_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Records last written before this instant were eligible.
    pub cutoff: DateTime<Utc>,
    /// Number of records removed.
    pub evicted: usize,
    /// Whether the pass succeeded.
    pub success: bool,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether this was a manual trigger.
    pub manual: bool,
}

/// Snapshot returned by `GET /janitor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorStatus {
    pub state: JanitorState,
    /// Normalized cron expression the pass runs on.
    pub schedule: String,
    /// Retention window in seconds.
    pub retention_secs: i64,
    pub pass_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Triggers dropped because a pass was already running.
    pub skipped_count: u64,
    pub evicted_total: u64,
    /// Most recent pass first.
    pub history: Vec<JanitorRun>,
}

/// Mutable counters behind the janitor's lock.
#[derive(Debug, Default)]
pub(crate) struct JanitorStats {
    pub pass_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub skipped_count: u64,
    pub evicted_total: u64,
    pub history: VecDeque<JanitorRun>,
}

impl JanitorStats {
    /// Folds a finished pass into the counters.
    pub fn record(&mut self, run: &JanitorRun) {
        self.pass_count += 1;
        if run.success {
            self.success_count += 1;
            self.evicted_total += run.evicted as u64;
        } else {
            self.failure_count += 1;
        }

        if self.history.len() >= MAX_HISTORY_ENTRIES {
            self.history.pop_front();
        }
        self.history.push_back(run.clone());
    }
}
