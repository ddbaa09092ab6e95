//! Command-line interface for telebackup
//!
//! - Argument parsing with clap
//! - Merging CLI overrides into the layered configuration
//! - One handler per subcommand, dispatched by [`execute_command`]

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::logger::init_logger;

/// Load the layered configuration, apply CLI overrides and validate.
pub fn load_and_merge_config(cli: &Cli) -> AppResult<Settings> {
    let merger = ConfigurationMerger::from_cli(cli)?;
    Ok(merger.merge_cli_args(cli)?)
}

/// Install the global tracing subscriber described by `settings.logger`.
pub fn init_logger_from_settings(settings: &Settings) -> AppResult<()> {
    let logger_config = settings.logger.clone().into_logger_config()?;
    init_logger(logger_config).map_err(|e| AppError::Configuration {
        key: "logger".to_string(),
        source: anyhow::Error::from(e),
    })
}
