use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use telebackup::cli::{Cli, execute_command, init_logger_from_settings, load_and_merge_config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_and_merge_config(&cli) {
        Ok(settings) => settings,
        Err(e) => return report("Configuration error", &e),
    };

    if let Err(e) = init_logger_from_settings(&settings) {
        return report("Logger initialization error", &e);
    }

    match execute_command(&cli, settings).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            report("Error", &e)
        }
    }
}

fn report(context: &str, error: &dyn Error) -> ExitCode {
    eprintln!("{context}: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    ExitCode::FAILURE
}
