//! Child-process execution with cooperative cancellation.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use crate::service::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

#[derive(Debug)]
pub(crate) enum CommandError {
    Spawn(std::io::Error),
    Wait(std::io::Error),
    Cancelled,
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Spawn(err) => write!(f, "failed to spawn: {err}"),
            CommandError::Wait(err) => write!(f, "failed to wait: {err}"),
            CommandError::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Run a command to completion, killing it if the token trips.
///
/// Output pipes are drained on background threads so a chatty child cannot
/// deadlock against the completion poll.
pub(crate) fn run_command(
    command: &mut Command,
    cancel: &CancelToken,
) -> Result<CommandOutput, CommandError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(CommandError::Spawn)?;

    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let status = loop {
        match child.try_wait().map_err(CommandError::Wait)? {
            Some(status) => break status,
            None => {
                if cancel.is_cancelled() {
                    kill_quietly(&mut child);
                    return Err(CommandError::Cancelled);
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    Ok(CommandOutput {
        status,
        stdout: join_pipe(stdout_handle),
        stderr: join_pipe(stderr_handle),
    })
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_pipe(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill_quietly(child: &mut Child) {
    if let Err(err) = child.kill() {
        tracing::debug!("Failed to kill child process: {err}");
    }
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let cancel = CancelToken::new();
        let output = run_command(Command::new("echo").arg("hello"), &cancel).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn cancelled_token_kills_a_long_running_command() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_command(Command::new("sleep").arg("30"), &cancel).unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
    }

    #[test]
    fn missing_binary_reports_spawn_failure() {
        let cancel = CancelToken::new();
        let err = run_command(&mut Command::new("definitely-not-a-real-binary"), &cancel).unwrap_err();
        assert!(matches!(err, CommandError::Spawn(_)));
    }
}
