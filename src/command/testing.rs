//! Test doubles for the command layer

use super::{CommandLine, CommandOutput, CommandRunner, ExecError, LineStream};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records every command and answers with canned outputs
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandLine>>,
    responses: Mutex<Vec<(String, CommandOutput)>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer commands whose rendered form contains `pattern`
    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((pattern.to_string(), output));
    }

    /// Queue a stream handed out by the next `stream` call
    pub fn push_stream(&self, stream: ScriptedStream) {
        self.streams.lock().unwrap().push_back(stream);
    }

    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls rendered as strings, handy for ordering assertions
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &CommandLine) -> CommandOutput {
        self.calls.lock().unwrap().push(command.clone());

        let rendered = command.to_string();
        self.responses
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::exited(0, ""))
    }

    fn stream(&self, command: &CommandLine) -> Result<Box<dyn LineStream>, ExecError> {
        self.calls.lock().unwrap().push(command.clone());

        match self.streams.lock().unwrap().pop_front() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(ExecError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no scripted stream"),
            }),
        }
    }
}

/// Line stream that replays a fixed script
pub struct ScriptedStream {
    lines: VecDeque<String>,
    /// `is_alive` answers true this many times once the lines run out
    alive_polls: usize,
    /// Never finish once the lines run out
    hang: bool,
    terminated: Arc<AtomicBool>,
}

impl ScriptedStream {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            alive_polls: 0,
            hang: false,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn alive_after_drain(mut self, polls: usize) -> Self {
        self.alive_polls = polls;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Flag set when the consumer terminates the stream
    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        self.terminated.clone()
    }
}

#[async_trait]
impl LineStream for ScriptedStream {
    async fn next_line(&mut self) -> Option<String> {
        if let Some(line) = self.lines.pop_front() {
            return Some(line);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        None
    }

    fn is_alive(&mut self) -> bool {
        if self.terminated.load(Ordering::SeqCst) {
            return false;
        }
        if self.hang {
            return true;
        }
        if self.alive_polls > 0 {
            self.alive_polls -= 1;
            return true;
        }
        false
    }

    async fn terminate(&mut self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}
