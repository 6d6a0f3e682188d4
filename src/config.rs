//! Service configuration.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults from [`crate::constants`]
//! 2. An optional TOML file
//! 3. Environment variables (`PORT`, `HOST`, `DB_PATH`, `BASIC_AUTH_USER`,
//!    `BASIC_AUTH_PASS`, `GC_SCHEDULE`, `RETENTION_DAYS`, `LOG_FORMAT`)
//! 4. Command-line flags, applied by the binary
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [database]
//! path = "/var/lib/upload-time/database.db"
//!
//! [auth]
//! username = "ops"
//! password = "s3cret"
//!
//! [janitor]
//! schedule = "0 4 */15 * *"
//! retention_days = 30
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Error, Result};
use crate::janitor::RetentionPolicy;
use crate::logging::LogFormat;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent startup.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub const fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub janitor: JanitorSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub host: String,
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

/// The single shared credential pair for HTTP Basic auth.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub username: String,
    pub password: String,
}

/// Eviction schedule and retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorSettings {
    /// Cron expression, 5, 6 or 7 fields.
    pub schedule: String,
    /// Records untouched for longer than this many days are evicted.
    pub retention_days: u32,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_PORT,
            host: constants::DEFAULT_HOST.to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_DB_PATH),
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            username: constants::DEFAULT_USERNAME.to_string(),
            password: constants::DEFAULT_PASSWORD.to_string(),
        }
    }
}

// Never print the password.
impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for JanitorSettings {
    fn default() -> Self {
        Self {
            schedule: constants::DEFAULT_SCHEDULE.to_string(),
            retention_days: constants::DEFAULT_RETENTION_DAYS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file.
    ///
    /// Without a path the built-in defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from the specified TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading config file {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Apply overrides from the process environment.
    ///
    /// Returns warnings for values that were present but unusable.
    pub fn apply_env(&mut self) -> Vec<String> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// Empty values are treated as unset. `BASIC_AUTH_USER` and
    /// `BASIC_AUTH_PASS` fall back to their defaults independently; a pair
    /// with either half unset is not reset as a whole.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();

        if let Some(port) = get("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warnings.push(format!(
                    "Invalid PORT environment variable value '{port}', using port {}",
                    self.server.port
                )),
            }
        }
        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(path) = get("DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(user) = get("BASIC_AUTH_USER") {
            self.auth.username = user;
        }
        if let Some(pass) = get("BASIC_AUTH_PASS") {
            self.auth.password = pass;
        }
        if let Some(schedule) = get("GC_SCHEDULE") {
            self.janitor.schedule = schedule;
        }
        if let Some(days) = get("RETENTION_DAYS") {
            match days.trim().parse::<u32>() {
                Ok(days) => self.janitor.retention_days = days,
                Err(_) => warnings.push(format!(
                    "Invalid RETENTION_DAYS value '{days}', using {} days",
                    self.janitor.retention_days
                )),
            }
        }
        if let Some(format) = get("LOG_FORMAT") {
            match format.parse::<LogFormat>() {
                Ok(format) => self.logging.format = format,
                Err(e) => warnings.push(e),
            }
        }

        warnings
    }

    /// Validate the resolved configuration.
    ///
    /// Returns warnings for risky but usable settings, such as the
    /// built-in credentials.
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port cannot be 0".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            errors.push("database.path cannot be empty".to_string());
        }
        if self.auth.username.is_empty() || self.auth.password.is_empty() {
            errors.push("auth.username and auth.password must both be set".to_string());
        }
        if self.janitor.retention_days == 0 {
            errors.push("janitor.retention_days must be at least 1".to_string());
        }
        if self.janitor.schedule.trim().is_empty() {
            errors.push("janitor.schedule cannot be empty".to_string());
        }
        if self.uses_default_credentials() {
            warnings.push(
                "Using default credentials! Set BASIC_AUTH_USER and BASIC_AUTH_PASS environment variables."
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(ValidationResult { warnings })
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }

    /// True when either half of the credential pair is the built-in default.
    pub fn uses_default_credentials(&self) -> bool {
        self.auth.username == constants::DEFAULT_USERNAME
            || self.auth.password == constants::DEFAULT_PASSWORD
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("invalid server.host '{}': {e}", self.server.host)))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// The retention policy handed to the janitor.
    pub const fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::days(self.janitor.retention_days)
    }

    /// Render the configuration as TOML with the password masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        redacted.auth.password = "********".to_string();
        toml::to_string_pretty(&redacted)
            .map_err(|e| Error::Internal(format!("failed to render config: {e}")))
    }
}
