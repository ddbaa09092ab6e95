//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use std::path::PathBuf;

use super::validation;
use crate::build;

/// Scheduled database and volume backups delivered to Telegram
#[derive(Parser, Debug)]
#[command(name = "telebackup")]
#[command(about = "Scheduled database and volume backups delivered to Telegram")]
#[command(long_about = "
telebackup runs backup jobs on cron schedules. Each run dumps a PostgreSQL,
MySQL or SQLite database (or archives a container volume), uploads the
artifact to a Telegram chat and records the outcome in the execution log.

EXAMPLES:
    # Start the scheduler, worker pool and diagnostics API
    telebackup serve

    # Check configuration without starting anything
    telebackup serve --dry-run

    # Apply database migrations
    telebackup migrate

    # Run job 3 now, the same way the scheduler would
    telebackup run-job 3

    # Which jobs are due at a given instant?
    telebackup due-jobs --at 2024-01-15T02:00:00Z

    # Next five firings of a cron expression
    telebackup schedule preview '30 3 * * 1-5' --timezone Europe/Berlin

    # Create an encryption key, then seal a bot token with it
    telebackup secret generate-key
    TELEBACKUP_VAULT__ENCRYPTION_KEY=... telebackup secret encrypt '123456:ABC'

    # Check that destination 2 holds a working bot token
    telebackup destination verify 2
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Read this single TOML file instead of the layered `config/` directory.
    /// `TELEBACKUP_*` environment variables still apply on top.
    #[arg(short, long, value_name = "FILE", value_parser = validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection (`TELEBACKUP_APP_ENV`)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler, the worker pool and the diagnostics API (default)
    ///
    /// Examples:
    ///   telebackup serve                            # Start with defaults
    ///   telebackup serve --host 0.0.0.0 --port 8080 # Expose the API
    ///   telebackup serve --no-scheduler             # API and manual runs only
    ///   telebackup serve --dry-run                  # Validate config and exit
    Serve {
        /// Address the diagnostics API binds to
        #[arg(long, value_name = "ADDRESS", value_parser = validation::validate_host_address)]
        host: Option<String>,

        /// Port the diagnostics API listens on
        #[arg(short, long, value_name = "PORT", value_parser = validation::validate_port)]
        port: Option<u16>,

        /// Log level override for this process
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Do not start the due-job scheduler
        #[arg(long)]
        no_scheduler: bool,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Database migration operations
    ///
    /// Examples:
    ///   telebackup migrate                 # Apply all pending migrations
    ///   telebackup migrate --dry-run       # List pending migrations
    ///   telebackup migrate --rollback 1    # Revert the last migration
    Migrate {
        /// List pending migrations without applying them
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to revert (1-100)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },

    /// Run one job immediately and wait for the outcome
    ///
    /// Takes the same per-job lock as scheduled runs within this process,
    /// applies the job timeout and writes an execution log entry. Exits
    /// non-zero when the run failed.
    RunJob {
        /// Job ID
        #[arg(value_name = "ID", value_parser = validation::validate_id)]
        id: i32,
    },

    /// List the active jobs whose schedule matches an instant
    DueJobs {
        /// Instant to evaluate (RFC 3339), defaults to now
        #[arg(long, value_name = "TIMESTAMP", value_parser = validation::validate_timestamp)]
        at: Option<Timestamp>,
    },

    /// Cron expression tools
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommand,
    },

    /// Encryption key and sealed secret tools
    Secret {
        #[command(subcommand)]
        action: SecretCommand,
    },

    /// Destination tools
    Destination {
        #[command(subcommand)]
        action: DestinationCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Print the next firing times of a five-field cron expression
    Preview {
        /// Cron expression, e.g. "0 2 * * *"
        #[arg(value_name = "CRON")]
        cron: String,

        /// Number of firings to show (1-100)
        #[arg(short = 'n', long, default_value_t = 5, value_parser = validation::validate_preview_count)]
        count: usize,

        /// Start after this instant (RFC 3339), defaults to now
        #[arg(long, value_name = "TIMESTAMP", value_parser = validation::validate_timestamp)]
        from: Option<Timestamp>,

        /// IANA time zone, defaults to `scheduler.timezone`
        #[arg(long, value_name = "ZONE")]
        timezone: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Print a new random base64 encryption key
    GenerateKey,

    /// Seal a value with the configured key (`vault.encryption_key`)
    ///
    /// Reads the value from standard input when it is not given, so secrets
    /// stay out of the shell history.
    Encrypt {
        #[arg(value_name = "VALUE")]
        value: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DestinationCommand {
    /// Decrypt the destination's credentials and call the Bot API `getMe`
    Verify {
        /// Destination ID
        #[arg(value_name = "ID", value_parser = validation::validate_id)]
        id: i32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Whether the command reads jobs, sources or destinations from Postgres.
    pub fn needs_database(&self) -> bool {
        match &self.command {
            None
            | Some(Commands::Serve { .. })
            | Some(Commands::Migrate { .. })
            | Some(Commands::RunJob { .. })
            | Some(Commands::DueJobs { .. })
            | Some(Commands::Destination { .. }) => true,
            Some(Commands::Schedule { .. }) | Some(Commands::Secret { .. }) => false,
        }
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}
