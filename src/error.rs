//! Error types for the timer store, service and scheduler.
//!
//! Structured errors with HTTP status code mappings and client-safe
//! messages, so handlers never leak storage internals.

use crate::store::UpsertOutcome;

/// Result type for store and service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the record store, timer service and janitor.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No record exists for the given id.
    #[error("timer not found: {id}")]
    NotFound { id: i64 },

    /// A record with the given id already exists.
    #[error("timer already exists: {id}")]
    Conflict { id: i64 },

    /// Underlying SQLite failure.
    #[error("storage error in {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite failure in the write half of an upsert.
    #[error("storage error in {} timer {id}: {source}", .outcome.verb())]
    Write {
        id: i64,
        outcome: UpsertOutcome,
        #[source]
        source: rusqlite::Error,
    },

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid input from a caller.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Scheduler error.
    #[error("schedule error: {0}")]
    Schedule(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a storage error with context.
    pub fn storage(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns true for the "absent record" case.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get the appropriate HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::InvalidRequest(_) => 400,
            Self::Config(_) => 422,
            Self::Storage { .. }
            | Self::Write { .. }
            | Self::Io { .. } | Self::Schedule(_) | Self::Internal(_) => 500,
        }
    }

    /// Get a client-safe error message (doesn't leak internal details).
    pub const fn client_message(&self) -> &str {
        match self {
            Self::NotFound { .. } => "Timestamp not found",
            Self::Conflict { .. } => "Timestamp already exists",
            Self::InvalidRequest(_) => "Invalid request",
            Self::Config(_) => "Configuration error",
            _ => "Internal server error",
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound { id: 1 }.status_code(), 404);
        assert_eq!(Error::Conflict { id: 1 }.status_code(), 409);
        assert_eq!(Error::InvalidRequest("bad".into()).status_code(), 400);
        assert_eq!(Error::Config("bad".into()).status_code(), 422);
        assert_eq!(
            Error::storage("get", rusqlite::Error::InvalidQuery).status_code(),
            500
        );
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = Error::storage("update timestamps", rusqlite::Error::InvalidQuery);
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.to_string().contains("update timestamps"));
    }

    #[test]
    fn test_write_error_names_branch() {
        let err = Error::Write {
            id: 7,
            outcome: UpsertOutcome::Updated,
            source: rusqlite::Error::InvalidQuery,
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.to_string().starts_with("storage error in updating timer 7"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound { id: -3 }.is_not_found());
        assert!(!Error::Conflict { id: -3 }.is_not_found());
    }
}
