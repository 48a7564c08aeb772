//! Bounded execution of external commands.
//!
//! Every `docker` and `git` invocation goes through [`CommandExecutor`], which
//! captures output and kills the child process when the timeout expires.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::StackError;

/// Runs external programs with a timeout.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    /// Bound on each command.
    timeout: Duration,
    /// Working directory, inherited when `None`.
    working_dir: Option<PathBuf>,
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,
    /// Command output (stdout).
    pub stdout: String,
    /// Command error output (stderr).
    pub stderr: String,
    /// Exit code if available.
    pub exit_code: Option<i32>,
}

impl CommandResult {
    /// Returns stderr, or stdout when stderr is empty, trimmed.
    #[must_use]
    pub fn output(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

impl CommandExecutor {
    /// Creates an executor with the given per-command timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            working_dir: None,
        }
    }

    /// Returns a copy of this executor running in `dir`.
    #[must_use]
    pub fn with_dir(&self, dir: &Path) -> Self {
        Self {
            timeout: self.timeout,
            working_dir: Some(dir.to_path_buf()),
        }
    }

    /// Returns the per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs a command and captures its output.
    ///
    /// A non-zero exit status is not an error here; see [`Self::run_checked`].
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be spawned or does not finish
    /// within the timeout.
    pub async fn run(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandResult, StackError> {
        let command_line = display_command(program, args);
        debug!(command = %command_line, dir = ?self.working_dir, "Running command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| StackError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .await
                    .map_err(|e| StackError::Spawn {
                        program: program.to_string(),
                        message: format!("failed to write stdin: {e}"),
                    })?;
            }
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| StackError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?,
            Err(_) => {
                warn!(command = %command_line, timeout = ?self.timeout, "Command timed out, killed");
                return Err(StackError::Timeout {
                    command: command_line,
                    timeout: self.timeout,
                });
            }
        };

        let result = CommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        if !result.success {
            debug!(
                command = %command_line,
                exit_code = ?result.exit_code,
                stderr = %result.stderr.trim(),
                "Command exited unsuccessfully"
            );
        }

        Ok(result)
    }

    /// Runs a command and fails on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot run, times out, or fails.
    pub async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<CommandResult, StackError> {
        let result = self.run(program, args, stdin).await?;
        if result.success {
            Ok(result)
        } else {
            Err(StackError::CommandFailed {
                command: display_command(program, args),
                output: result.output().to_string(),
            })
        }
    }
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
