//! Log streamer - tails compose logs for one client

use crate::command::{CommandLine, CommandRunner, ExecError, LineStream};
use crate::config::{LogConfig, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Spawns one tailing process per subscriber
pub struct LogStreamer {
    runner: Arc<dyn CommandRunner>,
    services: ServiceConfig,
    config: LogConfig,
}

impl LogStreamer {
    pub fn new(runner: Arc<dyn CommandRunner>, services: ServiceConfig, config: LogConfig) -> Self {
        Self {
            runner,
            services,
            config,
        }
    }

    fn tail_command(&self) -> CommandLine {
        CommandLine::new(self.services.compose_program.as_str())
            .arg("-f")
            .arg(self.services.compose_file.to_string_lossy())
            .args(["logs", "-f"])
    }

    /// Start tailing; lines arrive on the returned receiver until the
    /// process ends. Dropping the receiver kills the process.
    pub fn subscribe(&self) -> Result<mpsc::Receiver<String>, ExecError> {
        let command = self.tail_command();
        let source = self.runner.stream(&command)?;
        info!(command = %command, "log stream opened");

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        tokio::spawn(pump_lines(source, tx, self.config.exit_poll()));
        Ok(rx)
    }
}

/// Forward lines until the process is drained and gone, or the client leaves
async fn pump_lines(mut source: Box<dyn LineStream>, tx: mpsc::Sender<String>, exit_poll: Duration) {
    let mut forwarded: u64 = 0;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(forwarded, "log client disconnected");
                break;
            }
            line = source.next_line() => match line {
                Some(line) => {
                    let line = line.replace('\r', "").trim_end().to_string();
                    if tx.send(line).await.is_err() {
                        debug!(forwarded, "log client disconnected");
                        break;
                    }
                    forwarded += 1;
                }
                // Output exhausted: only the exit status decides now
                None => {
                    if !source.is_alive() {
                        break;
                    }
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = tokio::time::sleep(exit_poll) => {}
                    }
                }
            }
        }
    }

    source.terminate().await;
    info!(forwarded, "log stream closed");
}
