//! Service log streaming
//!
//! Each client gets its own tailing process; lines travel to the HTTP
//! response through a bounded channel, and dropping the receiving side
//! terminates the process.

mod streamer;

pub use streamer::LogStreamer;
