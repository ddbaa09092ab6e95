use std::path::PathBuf;

use async_trait::async_trait;

use super::error::ExtractionError;
use super::{ExtractRequest, SourceExtractor, finalize_sql_dump, process};
use crate::models::{DatabaseSource, SourceKind};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Plain-SQL dump through `pg_dump`. The password goes through `PGPASSWORD`,
/// never the command line.
#[derive(Debug, Clone)]
pub struct PostgresExtractor {
    pg_dump: String,
}

impl PostgresExtractor {
    pub fn new(pg_dump: impl Into<String>) -> Self {
        Self {
            pg_dump: pg_dump.into(),
        }
    }

    pub(crate) fn arguments(db: &DatabaseSource) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            db.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            "-p".to_string(),
            db.port.unwrap_or(DEFAULT_PORT).to_string(),
        ];
        if let Some(user) = &db.user {
            args.push("-U".to_string());
            args.push(user.clone());
        }
        args.extend(
            ["--no-password", "--clean", "--if-exists", "--create"]
                .into_iter()
                .map(String::from),
        );
        args.push(db.database.clone());
        args
    }
}

#[async_trait]
impl SourceExtractor for PostgresExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Postgres
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<PathBuf, ExtractionError> {
        let db = request.database()?;
        let sql_file = request.staging.join(format!("{}.sql", request.base_name()));

        let mut command = process::command(&self.pg_dump);
        command.args(Self::arguments(db));
        if let Some(password) = request.password {
            command.env("PGPASSWORD", password);
        }

        let written = process::run_to_file(command, "pg_dump", &sql_file).await?;
        tracing::debug!(database = %db.database, bytes = written, "pg_dump finished");

        finalize_sql_dump(sql_file, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DbEngine;

    fn source() -> DatabaseSource {
        DatabaseSource {
            engine: DbEngine::Postgres,
            host: Some("db.internal".to_string()),
            port: Some(6543),
            database: "orders".to_string(),
            user: Some("backup".to_string()),
            password_encrypted: Some("sealed".to_string()),
        }
    }

    #[test]
    fn test_arguments_never_contain_password() {
        let args = PostgresExtractor::arguments(&source());
        assert_eq!(
            args,
            vec![
                "-h", "db.internal", "-p", "6543", "-U", "backup", "--no-password", "--clean",
                "--if-exists", "--create", "orders"
            ]
        );
        assert!(!args.iter().any(|arg| arg.contains("sealed")));
    }

    #[test]
    fn test_defaults_for_host_and_port() {
        let mut db = source();
        db.host = None;
        db.port = None;
        db.user = None;
        let args = PostgresExtractor::arguments(&db);
        assert_eq!(&args[..4], ["-h", "localhost", "-p", "5432"]);
        assert!(!args.contains(&"-U".to_string()));
    }
}
