//! Firmware update handling
//!
//! This module handles:
//! - Tracking whether an update was accepted in this process lifetime
//! - Staging the uploaded bundle and running the installer
//! - Re-arming first-boot provisioning and rebooting the device

mod manager;

pub use manager::{SubmitOutcome, UpdateError, UpdateManager};
