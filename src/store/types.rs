//! Record and policy types for the timer store.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A stored timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Derived from `name`; primary key.
    pub id: i64,
    /// Human-readable label.
    pub name: String,
    /// Non-negative quantity attached to the name.
    pub seconds: i64,
    /// Time of the most recent write, whole seconds.
    #[serde(rename = "timestamp")]
    pub last_updated: DateTime<Utc>,
}

/// Which branch of an upsert was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    /// The name was new; a record was created.
    Inserted,
    /// An existing record was overwritten.
    Updated,
}

impl UpsertOutcome {
    /// Present participle of the write, for messages.
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Inserted => "inserting",
            Self::Updated => "updating",
        }
    }
}

/// Age threshold beyond which records are evicted.
///
/// A record is stale when `last_updated < now - window`. A record exactly
/// `window` old is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window_secs: i64,
}

impl RetentionPolicy {
    /// Retention window of `days` whole days.
    pub const fn days(days: u32) -> Self {
        Self {
            window_secs: days as i64 * 86_400,
        }
    }

    /// Retention window of `secs` seconds. Negative input is treated as 0.
    pub const fn seconds(secs: i64) -> Self {
        Self {
            window_secs: if secs < 0 { 0 } else { secs },
        }
    }

    /// Window length in seconds.
    pub const fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// The oldest `last_updated` that survives a pass run at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.window_secs)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
