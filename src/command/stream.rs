//! Line streams over long-running processes

use super::executor::{CommandLine, ExecError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

/// Lines buffered between the pipe readers and the consumer
const LINE_BUFFER: usize = 256;

/// Pull-based view of a process's output
#[async_trait]
pub trait LineStream: Send {
    /// Next output line, or `None` once all output has been read
    async fn next_line(&mut self) -> Option<String>;

    /// Whether the process is still running
    fn is_alive(&mut self) -> bool;

    /// Kill the process if it is still running
    async fn terminate(&mut self);
}

/// A spawned child whose stdout and stderr feed one line channel
pub struct ProcessStream {
    command: String,
    child: Child,
    lines: mpsc::Receiver<String>,
}

impl ProcessStream {
    /// Spawn `command`; the child is killed if this handle is dropped
    pub fn spawn(command: &CommandLine) -> Result<Self, ExecError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        debug!(command = %command, pid = ?child.id(), "spawned streaming process");

        Ok(Self {
            command: command.to_string(),
            child,
            lines,
        })
    }
}

#[async_trait]
impl LineStream for ProcessStream {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self) {
        if self.is_alive() {
            debug!(command = %self.command, "killing streaming process");
            if let Err(e) = self.child.kill().await {
                debug!(command = %self.command, error = %e, "kill failed");
            }
        }
    }
}

/// Copy lines from one pipe into the shared channel
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(|c| c == '\n' || c == '\r')
                    .to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(error = %e, "stopped reading process output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_and_stderr_are_merged() {
        let cmd = CommandLine::new("sh").args(["-c", "echo out; echo err >&2"]);
        let mut stream = ProcessStream::spawn(&cmd).expect("spawn failed");

        let mut lines = Vec::new();
        while let Some(line) = stream.next_line().await {
            lines.push(line);
        }
        lines.sort();

        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
    }

    #[tokio::test]
    async fn test_terminate_kills_running_process() {
        let cmd = CommandLine::new("sleep").arg("30");
        let mut stream = ProcessStream::spawn(&cmd).expect("spawn failed");

        assert!(stream.is_alive());
        stream.terminate().await;
        assert!(!stream.is_alive());
        assert_eq!(stream.next_line().await, None);
    }

    #[test]
    fn test_spawn_failure() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let result = ProcessStream::spawn(&CommandLine::new("/nonexistent/tail-logs"));
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }
}
