// =============================================================================
// Lint Configuration
// =============================================================================

#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(missing_debug_implementations)] // Store and scheduler wrap handles without Debug

// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::missing_panics_doc)] // Panics only in tests
#![allow(clippy::module_name_repetitions)] // e.g., janitor::JanitorStatus is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! Library crate for upload-time: an authenticated HTTP store for named
//! timers with scheduled eviction of stale entries.
//!
//! # Layers
//!
//! - [`store`] - SQLite table of timer records keyed by a name-derived id
//! - [`service`] - Timer operations (normalize, derive, upsert)
//! - [`janitor`] - Cron-driven eviction of records older than the retention window
//! - [`http`] - axum router with HTTP Basic auth
//!
//! # Example
//!
//! ```
//! use upload_time::store::derive_id;
//!
//! // Ids are the first 8 bytes of the BLAKE3 digest, big-endian
//! assert_eq!(derive_id(""), -5_831_236_029_470_105_178);
//! assert_eq!(derive_id("alarm"), derive_id("alarm"));
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod janitor;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod store;

pub use config::AppConfig;
pub use error::{Error, Result};
