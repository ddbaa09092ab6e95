use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::jobs::cron::CronSchedule;

/// Shape of the artifact a job produces
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, DbEnum, ToSchema,
)]
#[db_enum(existing_type_path = "crate::schema::sql_types::OutputFormat")]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Dump file as produced by the tool (`.sql`, or the SQLite file itself)
    RawDump,
    /// Dump wrapped in a gzip-compressed tar archive
    #[default]
    CompressedArchive,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::RawDump => "raw_dump",
            OutputFormat::CompressedArchive => "compressed_archive",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "raw_dump" | "raw" => Ok(OutputFormat::RawDump),
            "compressed_archive" | "compressed" | "archive" => Ok(OutputFormat::CompressedArchive),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::backup_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BackupJob {
    pub id: i32,
    pub name: String,
    pub source_id: i32,
    pub destination_id: i32,
    pub cron_expression: String,
    pub output_format: OutputFormat,
    pub is_active: bool,
    pub timeout_secs: Option<i32>,
    pub created_at: jiff_diesel::Timestamp,
    pub updated_at: jiff_diesel::Timestamp,
}

impl BackupJob {
    /// Per-job timeout override, if one is set and positive
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs
            .and_then(|secs| u64::try_from(secs).ok())
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }
}

/// A job to insert. The cron expression is checked before it reaches the store.
#[derive(Debug, Insertable, Deserialize, Validate, Clone)]
#[diesel(table_name = crate::schema::backup_jobs)]
pub struct NewBackupJob {
    #[validate(length(min = 1, max = 255, message = "Job name must be between 1 and 255 characters"))]
    pub name: String,
    pub source_id: i32,
    pub destination_id: i32,
    #[validate(custom(function = "validate_cron_expression"))]
    pub cron_expression: String,
    pub output_format: OutputFormat,
    pub is_active: bool,
    #[validate(range(min = 1, message = "Timeout must be at least one second"))]
    pub timeout_secs: Option<i32>,
}

fn validate_cron_expression(expression: &str) -> Result<(), ValidationError> {
    CronSchedule::parse(expression).map(|_| ()).map_err(|e| {
        let mut error = ValidationError::new("cron");
        error.message = Some(e.to_string().into());
        error
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(cron: &str) -> NewBackupJob {
        NewBackupJob {
            name: "nightly".to_string(),
            source_id: 1,
            destination_id: 1,
            cron_expression: cron.to_string(),
            output_format: OutputFormat::CompressedArchive,
            is_active: true,
            timeout_secs: None,
        }
    }

    #[test]
    fn test_valid_job_passes() {
        assert!(new_job("0 2 * * *").validate().is_ok());
    }

    #[test]
    fn test_malformed_cron_is_rejected() {
        let errors = new_job("0 2 * *").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("cron_expression"));

        assert!(new_job("61 * * * *").validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut job = new_job("0 2 * * *");
        job.timeout_secs = Some(0);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("raw_dump".parse::<OutputFormat>(), Ok(OutputFormat::RawDump));
        assert_eq!("compressed-archive".parse::<OutputFormat>(), Ok(OutputFormat::CompressedArchive));
        assert!("zip".parse::<OutputFormat>().is_err());
    }
}
