//! Cancellable external command runner

use crate::error::{Error, IoResultExt, Result};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs external tools, killing them when the run is cancelled
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    cancel: CancellationToken,
}

impl CommandRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `cmd` with captured output and return its stdout
    ///
    /// A nonzero exit becomes [`Error::SubprocessFailure`] carrying the
    /// combined stdout and stderr.
    pub async fn output(&self, mut cmd: Command) -> Result<String> {
        let described = describe(&cmd);
        debug!("Running {}", described);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            output = cmd.output() => output.with_path(program(&cmd))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::subprocess(
                described,
                output.status.to_string(),
                format!("{}{}", stdout, stderr),
            ));
        }
        Ok(stdout)
    }

    /// Run `cmd` with stdio inherited from the parent
    pub async fn status(&self, mut cmd: Command) -> Result<()> {
        let described = describe(&cmd);
        debug!("Running {}", described);

        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let mut child = cmd.spawn().with_path(program(&cmd))?;

        let status = tokio::select! {
            biased;
            // kill_on_drop reaps the child
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            status = child.wait() => status.with_path(program(&cmd))?,
        };

        if !status.success() {
            return Err(Error::subprocess(described, status.to_string(), ""));
        }
        Ok(())
    }
}

fn program(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

/// Render a command line for logs and error messages
pub fn describe(cmd: &Command) -> String {
    let std = cmd.as_std();
    let mut parts = vec![std.get_program().to_string_lossy().into_owned()];
    parts.extend(std.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello"]);
        let out = CommandRunner::default().output(cmd).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_failure_keeps_output() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let err = CommandRunner::default().output(cmd).await.unwrap_err();
        match err {
            Error::SubprocessFailure { command, output, .. } => {
                assert_eq!(command, "sh -c echo boom >&2; exit 3");
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_status_failure_names_command() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 2"]);
        let err = CommandRunner::default().status(cmd).await.unwrap_err();
        assert!(matches!(err, Error::SubprocessFailure { ref command, .. } if command == "sh -c exit 2"));
    }

    #[tokio::test]
    async fn test_cancelled_runner_does_not_spawn_work() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err = CommandRunner::new(cancel).status(cmd).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
