//! Configuration merger for CLI arguments and config files
//!
//! CLI flags have the highest priority: they are applied on top of whatever
//! the layered configuration and the `TELEBACKUP_*` variables produced.

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, settings::Settings};

pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration the CLI points at: the `--config` file
    /// when given, the layered `config/` directory otherwise. `--env` picks
    /// the environment layer.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let loader = match &cli.config {
            Some(path) => ConfigLoader::with_file(path),
            None => ConfigLoader::new()?,
        };
        let loader = match cli.env {
            Some(env) => loader.environment_override(env.into()),
            None => loader,
        };

        Ok(Self::new(loader.load()?))
    }

    /// Apply CLI overrides to the base configuration and validate the result.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command, cli.verbose);
        }

        config.validate()?;
        if cli.needs_database() {
            config.database.validate()?;
        }

        Ok(config)
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands, verbose: bool) {
        match command {
            Commands::Serve {
                host,
                port,
                log_level,
                no_scheduler,
                dry_run: _,
            } => {
                if let Some(host_addr) = host {
                    config.server.host = host_addr.clone();
                }
                if let Some(port_num) = port {
                    config.server.port = *port_num;
                }
                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
                if *no_scheduler {
                    config.scheduler.enabled = false;
                }
            }
            // Output of these is meant for pipes; keep info logs off stdout.
            Commands::Schedule { .. } | Commands::Secret { .. } if !verbose => {
                config.logger.level = "warn".to_string();
            }
            _ => {}
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}
