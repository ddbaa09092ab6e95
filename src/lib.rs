//! telebackup
//!
//! Scheduled backups of databases and Docker volumes, delivered to Telegram
//! channels. Jobs, sources and destinations live in PostgreSQL; credentials
//! are stored encrypted.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod destinations;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod models;
pub mod repositories;
pub mod schema;
pub mod server;
pub mod sources;
pub mod state;
pub mod utils;
pub mod vault;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
