//! Command executor - runs privileged host commands and captures their output

use super::stream::{LineStream, ProcessStream};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors raised when a process cannot be started
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Program plus argument vector, executed without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process could not be spawned or died from a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed `stdout`
    #[cfg(test)]
    pub fn exited(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(code),
        }
    }

    fn spawn_failure(err: &std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: err.to_string(),
            exit_code: None,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A command together with what it produced
#[derive(Debug, Clone)]
pub struct CommandReport {
    pub command: CommandLine,
    pub output: CommandOutput,
}

impl CommandReport {
    pub fn succeeded(&self) -> bool {
        self.output.success()
    }
}

/// Runs host commands on behalf of the device components
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    /// Run to completion. Never fails: spawn errors come back as an output
    /// without exit code.
    async fn run(&self, command: &CommandLine) -> CommandOutput;

    /// Spawn a long-running process with stdout and stderr merged into one
    /// line stream
    fn stream(&self, command: &CommandLine) -> Result<Box<dyn LineStream>, ExecError>;
}

/// Runner backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandLine) -> CommandOutput {
        debug!(command = %command, "running host command");

        let result = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match result {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                exit_code: out.status.code(),
            },
            Err(e) => {
                warn!(command = %command, error = %e, "failed to spawn host command");
                return CommandOutput::spawn_failure(&e);
            }
        };

        if output.success() {
            debug!(command = %command, "host command completed");
        } else {
            warn!(
                command = %command,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "host command failed"
            );
        }

        output
    }

    fn stream(&self, command: &CommandLine) -> Result<Box<dyn LineStream>, ExecError> {
        let stream = ProcessStream::spawn(command)?;
        Ok(Box::new(stream))
    }
}
