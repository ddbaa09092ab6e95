//! Command executor for dispatching CLI commands
//!
//! Runs after parsing, configuration loading and logger setup. Every command
//! reports through the returned exit code; errors are left to `main`.

use std::process::ExitCode;

use super::handlers::{
    DestinationCommandHandler, DueJobsCommandHandler, MigrateCommandHandler,
    RunJobCommandHandler, ScheduleCommandHandler, SecretCommandHandler, ServeCommandHandler,
};
use super::parser::{Cli, Commands, DestinationCommand, ScheduleCommand, SecretCommand};
use crate::config::settings::Settings;
use crate::error::AppResult;

/// Execute a CLI command with the given settings. No subcommand means `serve`.
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<ExitCode> {
    warn_about_command_args(cli);

    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await?
        }
        None => ServeCommandHandler::new(settings).execute(false).await?,
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(*dry_run, *rollback)
                .await?
        }
        Some(Commands::RunJob { id }) => {
            return RunJobCommandHandler::new(settings).execute(*id).await;
        }
        Some(Commands::DueJobs { at }) => DueJobsCommandHandler::new(settings).execute(*at).await?,
        Some(Commands::Schedule {
            action:
                ScheduleCommand::Preview {
                    cron,
                    count,
                    from,
                    timezone,
                },
        }) => ScheduleCommandHandler::new(settings).preview(
            cron,
            *count,
            *from,
            timezone.as_deref(),
        )?,
        Some(Commands::Secret { action }) => {
            let handler = SecretCommandHandler::new(settings);
            match action {
                SecretCommand::GenerateKey => handler.generate_key()?,
                SecretCommand::Encrypt { value } => handler.encrypt(value.as_deref())?,
            }
        }
        Some(Commands::Destination {
            action: DestinationCommand::Verify { id },
        }) => DestinationCommandHandler::new(settings).verify(*id).await?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Warn about argument combinations that are legal but probably unintended.
fn warn_about_command_args(cli: &Cli) {
    match &cli.command {
        Some(Commands::Serve {
            host: Some(host),
            port: Some(port),
            ..
        }) if *port < 1024 && host == "0.0.0.0" => {
            eprintln!(
                "Warning: Binding to 0.0.0.0 on port {} requires root privileges",
                port
            );
        }
        Some(Commands::Migrate {
            rollback: Some(steps),
            ..
        }) if *steps > 50 => {
            eprintln!(
                "Warning: Rolling back {} migrations is a large operation. Consider using smaller steps.",
                steps
            );
        }
        _ => {}
    }
}
