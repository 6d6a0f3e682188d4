//! upload-time - authenticated HTTP store for named timers.
//!
//! Entry point for the `upload-time` binary:
//!
//! - Serving the HTTP API (`upload-time serve`, the default)
//! - Checking the resolved configuration (`upload-time check-config`)
//! - Printing the id derived from a name (`upload-time derive <name>`)
//!
//! See `upload-time --help` for full usage information.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use upload_time::config::AppConfig;
use upload_time::constants::CONFIG_PATH_ENV;
use upload_time::janitor::validate_schedule;
use upload_time::logging::{LogFormat, init_logging};
use upload_time::store::derive_id;

const AFTER_HELP: &str = "\
ENVIRONMENT:
  PORT, HOST, DB_PATH               Listener and database location
  BASIC_AUTH_USER, BASIC_AUTH_PASS  Credentials (default admin/password)
  GC_SCHEDULE, RETENTION_DAYS       Janitor schedule and retention window
  LOG_FORMAT, RUST_LOG              Log output format and filter

EXAMPLES:
  upload-time                                  Serve on port 8080
  upload-time serve --port 9000 --db-path /var/lib/upload-time/db.sqlite
  upload-time check-config --config upload-time.toml
  upload-time derive alarm                     Id to use with DELETE /timestamps/{id}";

#[derive(Parser)]
#[command(name = "upload-time")]
#[command(version)]
#[command(about = "Authenticated HTTP store for named timers")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Print the resolved configuration and validate it
    ///
    /// The password is redacted. Exits non-zero if the configuration is
    /// invalid, including an unparsable cron schedule.
    CheckConfig,
    /// Print the id derived from a timer name
    Derive {
        /// Timer name, exactly as stored
        name: String,
    },
}

/// Command-line overrides, applied on top of file and environment settings.
#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file
    #[arg(long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, global = true)]
    host: Option<String>,

    /// SQLite database file
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Janitor cron schedule (5, 6 or 7 fields)
    #[arg(long, global = true)]
    schedule: Option<String>,

    /// Days a timer survives without being written
    #[arg(long, global = true)]
    retention_days: Option<u32>,

    /// Log output format: pretty, json or compact
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

impl ConfigArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(path) = &self.db_path {
            config.database.path.clone_from(path);
        }
        if let Some(schedule) = &self.schedule {
            config.janitor.schedule.clone_from(schedule);
        }
        if let Some(days) = self.retention_days {
            config.janitor.retention_days = days;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

/// Layers defaults, file, environment and flags.
fn resolve_config(args: &ConfigArgs) -> Result<(AppConfig, Vec<String>)> {
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let warnings = config.apply_env();
    args.apply(&mut config);
    Ok((config, warnings))
}

async fn serve(args: &ConfigArgs) -> Result<()> {
    let (config, env_warnings) = resolve_config(args)?;
    init_logging(config.logging.format, &config.logging.level);

    for warning in env_warnings {
        tracing::warn!("{warning}");
    }

    let validation = config.validate().context("Invalid configuration")?;
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        db = %config.database.path.display(),
        schedule = %config.janitor.schedule,
        retention_days = config.janitor.retention_days,
        "Starting upload-time"
    );

    upload_time::http::serve(config).await
}

fn check_config(args: &ConfigArgs) -> Result<()> {
    let (config, env_warnings) = resolve_config(args)?;

    println!("{}", config.to_redacted_toml()?);

    let validation = config.validate().context("Invalid configuration")?;
    let schedule = validate_schedule(&config.janitor.schedule).context("Invalid janitor schedule")?;
    config.listen_addr().context("Invalid listen address")?;

    for warning in env_warnings.iter().chain(&validation.warnings) {
        eprintln!("warning: {warning}");
    }
    println!("# Configuration OK (janitor schedule: {schedule})");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { command, overrides } = Cli::parse();

    match command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&overrides).await,
        Commands::CheckConfig => check_config(&overrides),
        Commands::Derive { name } => {
            println!("{}", derive_id(&name));
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["upload-time", "--port", "9000"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.overrides.port, Some(9000));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "upload-time",
            "serve",
            "--db-path",
            "/tmp/t.db",
            "--schedule",
            "0 4 * * *",
            "--retention-days",
            "7",
            "--log-format",
            "json",
            "--verbose",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.database.path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.janitor.schedule, "0 4 * * *");
        assert_eq!(config.janitor.retention_days, 7);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_derive_subcommand() {
        let cli = Cli::try_parse_from(["upload-time", "derive", "my alarm"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Derive { name }) if name == "my alarm"));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        assert!(Cli::try_parse_from(["upload-time", "--log-format", "xml"]).is_err());
    }
}
