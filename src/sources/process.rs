//! Running dump tools as child processes.
//!
//! stdout is streamed into the output file while stderr is collected for the
//! error message. Children are killed when the future is dropped, so a run
//! that times out does not leave a dump process behind.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use super::error::ExtractionError;

/// stderr fragments that mean the source could not be reached or refused us
const UNREACHABLE_MARKERS: &[&str] = &[
    "could not connect",
    "connection refused",
    "could not translate host name",
    "password authentication failed",
    "no pg_hba.conf entry",
    "timeout expired",
    "can't connect to",
    "unknown mysql server host",
    "access denied for user",
    "lost connection to",
    "cannot connect to the docker daemon",
    "is the docker daemon running",
];

/// Longest stderr excerpt kept in an error message
const MAX_STDERR_CHARS: usize = 500;

/// Build a command with the flags every extraction uses.
pub fn command(program: &str) -> Command {
    let mut command = Command::new(program);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Run `command`, streaming its stdout into `output`. Returns the bytes written.
pub async fn run_to_file(
    mut command: Command,
    program: &str,
    output: &Path,
) -> Result<u64, ExtractionError> {
    let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;

    let stdout = child.stdout.take().ok_or_else(|| {
        ExtractionError::ExtractionFailed(format!("{program}: stdout was not captured"))
    })?;
    let mut stderr = child.stderr.take().ok_or_else(|| {
        ExtractionError::ExtractionFailed(format!("{program}: stderr was not captured"))
    })?;

    let mut file = tokio::fs::File::create(output)
        .await
        .map_err(|e| ExtractionError::io("create output file", e))?;

    // stdout moves into the copy so a failed write closes the pipe, and the
    // child is killed so it cannot block on it.
    let copy = async {
        let mut stdout = stdout;
        let result = async {
            let written = tokio::io::copy(&mut stdout, &mut file).await?;
            file.flush().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;
        if result.is_err() {
            drop(stdout);
            if let Err(e) = child.start_kill() {
                tracing::debug!(program, error = %e, "Dump tool already exited");
            }
        }
        result
    };
    let collect = async {
        let mut buffer = Vec::new();
        stderr.read_to_end(&mut buffer).await.map(|_| buffer)
    };
    let (written, diagnostics) = tokio::join!(copy, collect);

    let status = child
        .wait()
        .await
        .map_err(|e| ExtractionError::ExtractionFailed(format!("{program}: {e}")))?;
    let written = written.map_err(|e| ExtractionError::io("write output file", e))?;
    let diagnostics = String::from_utf8_lossy(&diagnostics.unwrap_or_default()).into_owned();

    if !status.success() {
        return Err(classify_failure(program, status, &diagnostics));
    }
    if !diagnostics.trim().is_empty() {
        tracing::debug!(program, stderr = %excerpt(&diagnostics), "Dump tool reported warnings");
    }

    Ok(written)
}

/// Run `command` to completion and return its stdout, for short probes.
pub async fn run_captured(mut command: Command, program: &str) -> Result<String, ExtractionError> {
    let output = command
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;
    if !output.status.success() {
        let diagnostics = String::from_utf8_lossy(&output.stderr);
        return Err(classify_failure(program, output.status, &diagnostics));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn spawn_error(program: &str, error: std::io::Error) -> ExtractionError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ExtractionError::ExtractionFailed(format!("{program} was not found on PATH"))
    } else {
        ExtractionError::ExtractionFailed(format!("failed to start {program}: {error}"))
    }
}

pub(crate) fn classify_failure(program: &str, status: ExitStatus, stderr: &str) -> ExtractionError {
    let message = format!("{program} exited with {status}: {}", excerpt(stderr));
    let lowered = stderr.to_lowercase();

    if lowered.contains("no space left on device") {
        ExtractionError::InsufficientSpace(message)
    } else if UNREACHABLE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ExtractionError::SourceUnreachable(message)
    } else {
        ExtractionError::ExtractionFailed(message)
    }
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "no error output".to_string();
    }
    let count = trimmed.chars().count();
    if count <= MAX_STDERR_CHARS {
        trimmed.to_string()
    } else {
        // Tools print the actual error last
        let tail: String = trimmed.chars().skip(count - MAX_STDERR_CHARS).collect();
        format!("...{tail}")
    }
}
