//! Update State Cell
//!
//! Holds the single piece of state shared across requests: whether an
//! update has been accepted during this process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Update status reported by `/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// No update accepted since the process started
    Idle,
    /// An update was accepted; only a reboot leaves this state
    Updating,
}

impl UpdateStatus {
    fn as_u8(self) -> u8 {
        match self {
            UpdateStatus::Idle => 0,
            UpdateStatus::Updating => 1,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => UpdateStatus::Idle,
            _ => UpdateStatus::Updating,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStatus::Idle => "idle",
            UpdateStatus::Updating => "updating",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of trying to enter the updating state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginUpdate {
    /// The cell moved from idle to updating
    Started,
    /// Another update was accepted earlier
    AlreadyUpdating,
}

/// Atomically updated holder for [`UpdateStatus`]
///
/// The transition `Idle -> Updating` is one-way: there is no method that
/// moves the cell back to `Idle`.
#[derive(Debug)]
pub struct UpdateStateCell {
    status: AtomicU8,
}

impl Default for UpdateStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateStateCell {
    /// Create a new cell in the idle state
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(UpdateStatus::Idle.as_u8()),
        }
    }

    /// Current status
    pub fn status(&self) -> UpdateStatus {
        UpdateStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Move to `Updating` if still idle
    pub fn begin_update(&self) -> BeginUpdate {
        match self.status.compare_exchange(
            UpdateStatus::Idle.as_u8(),
            UpdateStatus::Updating.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => BeginUpdate::Started,
            Err(_) => BeginUpdate::AlreadyUpdating,
        }
    }
}
