//! Command execution infrastructure for the device agent
//!
//! This module handles:
//! - Running host commands as argument vectors (no shell)
//! - Capturing stdout, stderr and exit code of every invocation
//! - Spawning long-running processes whose output is read line by line
//!
//! It is the only part of the agent that crosses the OS process boundary.

mod executor;
mod stream;
#[cfg(test)]
pub mod testing;

pub use executor::{CommandLine, CommandReport, CommandRunner, ExecError, SystemRunner};
pub use stream::LineStream;

#[cfg(test)]
pub use executor::CommandOutput;
