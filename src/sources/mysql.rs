use std::path::PathBuf;

use async_trait::async_trait;

use super::error::ExtractionError;
use super::{ExtractRequest, SourceExtractor, finalize_sql_dump, process};
use crate::models::{DatabaseSource, SourceKind};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

/// Consistent InnoDB dump through `mysqldump`, password via `MYSQL_PWD`.
#[derive(Debug, Clone)]
pub struct MySqlExtractor {
    mysqldump: String,
}

impl MySqlExtractor {
    pub fn new(mysqldump: impl Into<String>) -> Self {
        Self {
            mysqldump: mysqldump.into(),
        }
    }

    pub(crate) fn arguments(db: &DatabaseSource) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            db.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            "-P".to_string(),
            db.port.unwrap_or(DEFAULT_PORT).to_string(),
        ];
        if let Some(user) = &db.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }
        args.extend(
            [
                "--single-transaction",
                "--routines",
                "--triggers",
                "--add-drop-database",
                "--create-options",
                "--databases",
            ]
            .into_iter()
            .map(String::from),
        );
        args.push(db.database.clone());
        args
    }
}

#[async_trait]
impl SourceExtractor for MySqlExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::MySql
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
        let db = request.database()?;
        let sql_file = request.staging.join(format!("{}.sql", request.base_name()));

        let mut command = process::command(&self.mysqldump);
        command.args(Self::arguments(db));
        if let Some(password) = request.password {
            command.env("MYSQL_PWD", password);
        }

        let written = process::run_to_file(command, "mysqldump", &sql_file).await?;
        tracing::debug!(database = %db.database, bytes = written, "mysqldump finished");

        finalize_sql_dump(sql_file, request).await
    }
}
