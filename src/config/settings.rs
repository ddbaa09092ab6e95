//! Configuration settings structures for telebackup
//!
//! Every section can be loaded from TOML files and overridden through
//! `TELEBACKUP_*` environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, RotationConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "telebackup".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/telebackup.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_files() -> usize {
    5
}

fn default_tick_interval() -> u64 {
    60
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_queue_capacity() -> usize {
    64
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_job_timeout() -> u64 {
    3600
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_max_artifact_bytes() -> u64 {
    50 * 1024 * 1024 // Bot API cloud upload limit
}

fn default_upload_timeout() -> u64 {
    600
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.1
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

fn default_mysqldump() -> String {
    "mysqldump".to_string()
}

fn default_docker() -> String {
    "docker".to_string()
}

fn default_archive_image() -> String {
    "alpine:3".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Diagnostics HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Whether `serve` also exposes the HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Manual runs triggered over HTTP are
    /// detached from the request, so this only bounds the response.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Configuration store connection (jobs, sources, destinations, execution logs)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Run pending migrations when `serve` starts
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSettings {
    /// Maximum file size in bytes before rotation
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of rotated files to keep
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default)]
    pub compress: bool,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_files: default_max_files(),
            compress: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default)]
    pub rotation: RotationSettings,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
            rotation: RotationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;

        let rotation = RotationConfig::new(
            self.rotation.max_size,
            self.rotation.max_files,
            self.rotation.compress,
        )
        .map_err(|e| ConfigError::ValidationError {
            field: "logger.file.rotation".to_string(),
            message: e.to_string(),
        })?;

        FileConfig::new(
            self.enabled,
            PathBuf::from(self.path),
            self.append,
            format,
            rotation,
        )
        .map_err(|e| ConfigError::ValidationError {
            field: "logger.file".to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Vault Configuration
// ============================================================================

/// Credential vault configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    /// Base64 encoded 32-byte key used to encrypt stored secrets.
    /// Supply it through `TELEBACKUP_VAULT__ENCRYPTION_KEY`.
    #[serde(default)]
    pub encryption_key: String,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.encryption_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("VaultConfig")
            .field("encryption_key", &key)
            .finish()
    }
}

// ============================================================================
// Scheduler Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether `serve` starts the due-job scheduler
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tick interval in seconds. 60 ticks on every minute boundary.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// IANA time zone the cron expressions are evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Capacity of the run request queue between scheduler and workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum number of backups running at the same time
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Hard limit for one run in seconds, unless the job overrides it
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_interval_secs: default_tick_interval(),
            timezone: default_timezone(),
            queue_capacity: default_queue_capacity(),
            worker_pool_size: default_worker_pool_size(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

// ============================================================================
// Delivery Configuration
// ============================================================================

/// Retry policy for transient delivery failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Random spread applied to each delay, as a fraction of the delay
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Bot API endpoint; point it at a self-hosted server to lift the upload limit
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Artifacts above this size fail before any upload attempt
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,

    /// Per-request timeout in seconds, covering the whole upload
    #[serde(default = "default_upload_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Send a notification to the destination when a run fails before delivery
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_artifact_bytes: default_max_artifact_bytes(),
            request_timeout_secs: default_upload_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            notify_on_failure: default_true(),
            retry: RetrySettings::default(),
        }
    }
}

// ============================================================================
// Sources Configuration
// ============================================================================

/// Locations of the external tools used to produce artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_pg_dump")]
    pub pg_dump_path: String,

    #[serde(default = "default_mysqldump")]
    pub mysqldump_path: String,

    /// Container runtime CLI used for volume archives
    #[serde(default = "default_docker")]
    pub docker_path: String,

    /// Image that runs `tar` against the mounted volume
    #[serde(default = "default_archive_image")]
    pub volume_archive_image: String,

    /// Parent directory for per-run workspaces, system temp dir when unset
    #[serde(default)]
    pub work_dir: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pg_dump_path: default_pg_dump(),
            mysqldump_path: default_mysqldump(),
            docker_path: default_docker(),
            volume_archive_image: default_archive_image(),
            work_dir: None,
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}
