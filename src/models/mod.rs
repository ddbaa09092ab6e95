mod backup_job;
mod destination;
mod execution_log;
mod source;

pub use backup_job::{BackupJob, NewBackupJob, OutputFormat};
pub use destination::{Destination, NewDestination};
pub use execution_log::{ExecutionLog, ExecutionLogQuery, LogStatus, NewExecutionLog};
pub use source::{
    DatabaseSource, DbEngine, NewSource, Source, SourceKind, SourceSpec, SourceType, VolumeSource,
};
