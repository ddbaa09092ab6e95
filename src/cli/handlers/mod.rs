//! Command handlers for CLI operations
//!
//! One handler per subcommand. Commands that touch jobs, sources or
//! destinations build the same [`crate::state::AppState`] the server uses.

pub mod destination;
pub mod due_jobs;
pub mod migrate;
pub mod run_job;
pub mod schedule;
pub mod secret;
pub mod serve;

pub use destination::DestinationCommandHandler;
pub use due_jobs::DueJobsCommandHandler;
pub use migrate::MigrateCommandHandler;
pub use run_job::RunJobCommandHandler;
pub use schedule::ScheduleCommandHandler;
pub use secret::SecretCommandHandler;
pub use serve::ServeCommandHandler;
