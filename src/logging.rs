//! Structured logging setup.
//!
//! Human-readable output for development, JSON for log aggregation.
//! `RUST_LOG` overrides the configured level when set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use tracing_subscriber::{filter::EnvFilter, fmt as tfmt, prelude::*};

/// Logging format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty human-readable output (default)
    #[default]
    Pretty,
    /// JSON output for log aggregation
    Json,
    /// Compact single-line output
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!(
                "Unknown log format '{other}' (expected pretty, json or compact)"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        })
    }
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at startup. A second call is a no-op.
pub fn init_logging(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(tfmt::layer().with_ansi(true).with_target(true));
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                tfmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(io::stdout),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(tfmt::layer().compact().with_ansi(true).with_target(false));
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
    }
}

/// Generate a unique request ID.
///
/// Format: `req_<32 hex chars>`
pub fn generate_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}
