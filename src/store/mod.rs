//! Durable timer storage.
//!
//! Records live in a single SQLite table keyed by an id derived from the
//! record's name (see [`derive_id`]).
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use upload_time::store::{RecordStore, UpsertOutcome, derive_id};
//!
//! # fn main() -> upload_time::error::Result<()> {
//! let store = RecordStore::open("data/database.db")?;
//! assert_eq!(store.upsert("alarm", 10, Utc::now())?, UpsertOutcome::Inserted);
//! let record = store.get_by_id(derive_id("alarm"))?;
//! assert_eq!(record.map(|r| r.seconds), Some(10));
//! # Ok(())
//! # }
//! ```
//!
//! # Module Structure
//!
//! - `derive` - Name to id derivation
//! - `records` - SQLite-backed [`RecordStore`]
//! - `types` - [`TimerRecord`], [`UpsertOutcome`], [`RetentionPolicy`]

mod derive;
mod records;
mod types;


pub use derive::derive_id;
pub use records::RecordStore;
pub use types::{RetentionPolicy, TimerRecord, UpsertOutcome};
