//! Centralized defaults and limits.
//!
//! Every fallback value used when configuration is absent lives here so the
//! defaults can be audited in one place.

// =============================================================================
// Server
// =============================================================================

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address (all interfaces).
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Maximum request body size (64 KB).
/// A timer upsert is a name and a number; anything larger is rejected.
pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "Restricted";

// =============================================================================
// Storage
// =============================================================================

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/database.db";

/// Milliseconds SQLite waits on a locked database before failing.
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Credentials
// =============================================================================

/// Fallback username. Startup warns when it is in use.
pub const DEFAULT_USERNAME: &str = "admin";

/// Fallback password. Startup warns when it is in use.
pub const DEFAULT_PASSWORD: &str = "password";

// =============================================================================
// Janitor
// =============================================================================

/// Default eviction schedule: 04:00 on days 1, 16 and 31 of every month.
///
/// Six-field form (`sec min hour day month weekday`).
pub const DEFAULT_SCHEDULE: &str = "0 0 4 */15 * *";

/// Default retention window in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

// =============================================================================
// HTTP Messages
// =============================================================================

/// Content-Type for JSON responses.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content-Type used for the bare seconds response.
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Header carrying the per-request correlation ID.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

// =============================================================================
// Config
// =============================================================================

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "UPLOAD_TIME_CONFIG";
