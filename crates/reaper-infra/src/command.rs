//! External command execution.

use std::process::Stdio;
use std::time::Instant;

use reaper_core::{BackendError, BackendResult};
use tokio::process::Command;
use tracing::debug;

/// Render `program args…` the way it would be typed in a shell.
pub fn render(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program` with `args` to completion and return its stdout.
///
/// A non-zero exit becomes [`BackendError::CommandFailed`] carrying stderr.
pub async fn run(program: &str, args: &[String]) -> BackendResult<String> {
    let command = render(program, args);
    let start = Instant::now();

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| BackendError::Spawn {
            command: command.clone(),
            source,
        })?;

    debug!(
        command = %command,
        duration_ms = start.elapsed().as_millis() as u64,
        status = %output.status,
        "Command finished"
    );

    if !output.status.success() {
        return Err(BackendError::CommandFailed {
            command,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
