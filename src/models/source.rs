//! Backup sources: a database to dump or a container volume to archive.
//!
//! Rows are stored flat (one table for both variants). [`Source::spec`] turns a
//! row into the tagged [`SourceSpec`] the extractors work with and rejects rows
//! missing what their variant needs.

use std::fmt;

use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Storage discriminator for a source row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, ToSchema)]
#[db_enum(existing_type_path = "crate::schema::sql_types::SourceType")]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Database,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum, ToSchema)]
#[db_enum(existing_type_path = "crate::schema::sql_types::DbEngine")]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    Postgres,
    Mysql,
    Sqlite,
}

/// What kind of extraction a source needs. Keys the extractor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    Sqlite,
    Volume,
}

impl SourceKind {
    /// Label used in artifact file names and log details
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Postgres => "postgresql",
            SourceKind::MySql => "mysql",
            SourceKind::Sqlite => "sqlite",
            SourceKind::Volume => "volume",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<DbEngine> for SourceKind {
    fn from(engine: DbEngine) -> Self {
        match engine {
            DbEngine::Postgres => SourceKind::Postgres,
            DbEngine::Mysql => SourceKind::MySql,
            DbEngine::Sqlite => SourceKind::Sqlite,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::sources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Source {
    pub id: i32,
    pub name: String,
    pub source_type: SourceType,
    pub db_engine: Option<DbEngine>,
    pub db_host: Option<String>,
    pub db_port: Option<i32>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password_encrypted: Option<String>,
    pub volume_name: Option<String>,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

#[derive(Debug, Insertable, Deserialize, Clone)]
#[diesel(table_name = crate::schema::sources)]
pub struct NewSource {
    pub name: String,
    pub source_type: SourceType,
    pub db_engine: Option<DbEngine>,
    pub db_host: Option<String>,
    pub db_port: Option<i32>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password_encrypted: Option<String>,
    pub volume_name: Option<String>,
}

impl NewSource {
    pub fn database(name: impl Into<String>, engine: DbEngine, db_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: SourceType::Database,
            db_engine: Some(engine),
            db_host: None,
            db_port: None,
            db_name: Some(db_name.into()),
            db_user: None,
            db_password_encrypted: None,
            volume_name: None,
        }
    }

    pub fn volume(name: impl Into<String>, volume_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: SourceType::Volume,
            db_engine: None,
            db_host: None,
            db_port: None,
            db_name: None,
            db_user: None,
            db_password_encrypted: None,
            volume_name: Some(volume_name.into()),
        }
    }
}

/// Connection details of a database source. The password stays sealed until
/// the coordinator decrypts it for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSource {
    pub engine: DbEngine,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: String,
    pub user: Option<String>,
    pub password_encrypted: Option<String>,
}

impl DatabaseSource {
    /// SQLite sources name their file in `host` when set, otherwise in the database name.
    pub fn sqlite_path(&self) -> &str {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => host,
            _ => &self.database,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSource {
    pub volume_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Database(DatabaseSource),
    Volume(VolumeSource),
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Database(db) => db.engine.into(),
            SourceSpec::Volume(_) => SourceKind::Volume,
        }
    }

    /// Sealed password, if the variant carries one
    pub fn password_encrypted(&self) -> Option<&str> {
        match self {
            SourceSpec::Database(db) => db.password_encrypted.as_deref(),
            SourceSpec::Volume(_) => None,
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Source {
    /// Validate the row against its variant and build the tagged description.
    pub fn spec(&self) -> AppResult<SourceSpec> {
        match self.source_type {
            SourceType::Database => {
                let engine = self
                    .db_engine
                    .ok_or_else(|| AppError::validation("db_engine", "database sources need an engine"))?;
                let database = present(&self.db_name).ok_or_else(|| {
                    AppError::validation("db_name", "database sources need a database name")
                })?;
                let port = self
                    .db_port
                    .map(u16::try_from)
                    .transpose()
                    .map_err(|_| AppError::validation("db_port", "port must be between 0 and 65535"))?;

                Ok(SourceSpec::Database(DatabaseSource {
                    engine,
                    host: present(&self.db_host),
                    port,
                    database,
                    user: present(&self.db_user),
                    password_encrypted: present(&self.db_password_encrypted),
                }))
            }
            SourceType::Volume => {
                let volume_name = present(&self.volume_name).ok_or_else(|| {
                    AppError::validation("volume_name", "volume sources need a volume name")
                })?;
                Ok(SourceSpec::Volume(VolumeSource { volume_name }))
            }
        }
    }
}
