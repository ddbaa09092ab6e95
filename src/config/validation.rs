//! Configuration validation logic
//!
//! `Settings::validate` runs on every load. Sections that only some commands
//! need (the database URL, the vault key) are checked by the commands
//! themselves, so `secret generate-key` works without a database.

use crate::config::error::ConfigError;
use crate::config::settings::{
    DatabaseConfig, DeliveryConfig, LoggerSettings, SchedulerConfig, ServerConfig, Settings,
    VaultConfig,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must not be empty and must use the postgres scheme
    /// - Max and min connections must be greater than 0
    /// - Min connections must not exceed max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Set TELEBACKUP_DATABASE__URL or database.url.",
            ));
        }

        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::ValidationError {
                field: "database.min_connections".to_string(),
                message: format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            });
        }

        Ok(())
    }
}

impl VaultConfig {
    /// Presence check only; the key itself is decoded when the vault is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encryption_key.trim().is_empty() {
            return Err(ConfigError::validation(
                "vault.encryption_key",
                "Encryption key is required. Generate one with `telebackup secret generate-key` \
                 and set TELEBACKUP_VAULT__ENCRYPTION_KEY.",
            ));
        }
        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_level = self.level.split(',').next().unwrap_or_default().trim();
        if !VALID_LOG_LEVELS.contains(&base_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.file.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        Ok(())
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::validation(
                "scheduler.tick_interval_secs",
                "Tick interval must be greater than 0 seconds.",
            ));
        }

        if jiff::tz::TimeZone::get(&self.timezone).is_err() {
            return Err(ConfigError::ValidationError {
                field: "scheduler.timezone".to_string(),
                message: format!("Unknown time zone '{}'.", self.timezone),
            });
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::validation(
                "scheduler.queue_capacity",
                "Queue capacity must be greater than 0.",
            ));
        }

        if self.worker_pool_size == 0 {
            return Err(ConfigError::validation(
                "scheduler.worker_pool_size",
                "Worker pool size must be greater than 0.",
            ));
        }

        if self.job_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "scheduler.job_timeout_secs",
                "Job timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError {
                field: "delivery.api_base_url".to_string(),
                message: format!("'{}' is not an http(s) URL.", self.api_base_url),
            });
        }

        if self.max_artifact_bytes == 0 {
            return Err(ConfigError::validation(
                "delivery.max_artifact_bytes",
                "Maximum artifact size must be greater than 0.",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::validation(
                "delivery.retry.max_attempts",
                "At least one delivery attempt is required.",
            ));
        }

        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::validation(
                "delivery.retry.multiplier",
                "Backoff multiplier must be at least 1.0.",
            ));
        }

        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err(ConfigError::validation(
                "delivery.retry.jitter_ratio",
                "Jitter ratio must be between 0.0 and 1.0.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Validate the sections every command relies on and return the first error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.scheduler.validate()?;
        self.delivery.validate()?;
        Ok(())
    }
}
