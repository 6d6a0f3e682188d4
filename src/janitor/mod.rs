//! Scheduled eviction of stale timers.
//!
//! A single `tokio-cron-scheduler` job triggers [`Janitor::run_pass`], which
//! deletes every record last written before `now - retention`.
//!
//! # Cron Expression Format
//!
//! The scheduler expects a seconds-first expression
//! (`sec min hour day month weekday [year]`). Classic 5-field expressions
//! are accepted and get a `0` seconds field prepended. Schedules run in UTC.
//!
//! # HTTP API
//!
//! - `GET /janitor` - Status and recent passes
//! - `POST /janitor/run` - Run a pass now
//!
//! # Module Structure
//!
//! - `types` - Type definitions (`JanitorRun`, `JanitorStatus`)
//! - `runner` - The [`Janitor`] and its pass logic
//! - `scheduler` - [`JanitorScheduler`] cron wiring

mod runner;
mod scheduler;
mod types;

pub use crate::store::RetentionPolicy;
pub use runner::{Janitor, PASS_FAILED_MESSAGE};
pub use scheduler::{JanitorScheduler, normalize_schedule, validate_schedule};
pub use types::{JanitorRun, JanitorState, JanitorStatus, MAX_HISTORY_ENTRIES};
