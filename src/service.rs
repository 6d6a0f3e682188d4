//! Timer service: the business operations behind the HTTP surface.
//!
//! Normalizes client input, derives ids and delegates persistence to the
//! [`RecordStore`]. Presentation concerns stay in the `http` module.

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics;
use crate::store::{RecordStore, TimerRecord, UpsertOutcome, derive_id};

/// Result of a successful [`TimerService::set_timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Saved {
    pub id: i64,
    pub outcome: UpsertOutcome,
}

/// Converts a client-supplied quantity to stored whole seconds.
///
/// Truncates toward zero. Negative values and NaN become 0, values beyond
/// `i64::MAX` saturate.
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_seconds(value: f64) -> i64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    // `as` saturates for out-of-range floats
    value.trunc() as i64
}

/// Current time rounded to the nearest whole second.
pub fn now_seconds() -> DateTime<Utc> {
    nearest_second(Utc::now())
}

fn nearest_second(t: DateTime<Utc>) -> DateTime<Utc> {
    t.round_subsecs(0)
}

/// Named timer operations over a shared store.
#[derive(Clone)]
pub struct TimerService {
    store: RecordStore,
}

impl TimerService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Stores `seconds` under `name`, creating or overwriting the record.
    pub async fn set_timer(&self, name: &str, seconds: f64) -> Result<Saved> {
        self.set_timer_at(name, seconds, now_seconds()).await
    }

    /// [`TimerService::set_timer`] with an explicit clock.
    pub async fn set_timer_at(
        &self,
        name: &str,
        seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<Saved> {
        let normalized = normalize_seconds(seconds);
        let id = derive_id(name);

        let result = self
            .store
            .upsert_async(name.to_string(), normalized, now)
            .await;
        metrics::record_timer_operation("set", result.is_ok());

        match result {
            Ok(outcome) => {
                info!(name = %name, id, seconds = normalized, ?outcome, "Timer saved");
                Ok(Saved { id, outcome })
            },
            Err(e) => {
                warn!(name = %name, id, error = %e, "Failed to save timer");
                Err(e)
            },
        }
    }

    /// Looks up a timer by name. `Ok(None)` when no record exists.
    pub async fn get_timer(&self, name: &str) -> Result<Option<TimerRecord>> {
        let result = self.store.get_by_name_async(name.to_string()).await;
        metrics::record_timer_operation("get", result.is_ok());

        if let Ok(None) = result {
            debug!(name = %name, id = derive_id(name), "Timer not found");
        }
        result
    }

    /// Every stored timer, ordered by name.
    pub async fn list_timers(&self) -> Result<Vec<TimerRecord>> {
        let result = self.store.list_all_async().await;
        metrics::record_timer_operation("list", result.is_ok());
        result
    }

    /// Deletes a timer by id.
    ///
    /// Fails with [`crate::error::Error::NotFound`] if the id is absent.
    pub async fn delete_timer(&self, id: i64) -> Result<()> {
        let result = self.store.delete_by_id_async(id).await;
        metrics::record_timer_operation("delete", result.is_ok());

        match &result {
            Ok(()) => info!(id, "Timer deleted"),
            Err(e) if e.is_not_found() => debug!(id, "Delete of unknown timer"),
            Err(e) => warn!(id, error = %e, "Failed to delete timer"),
        }
        result
    }
}
