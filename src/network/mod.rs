//! Wireless network configuration
//!
//! This module handles:
//! - Writing the supplicant profile for a requested network
//! - Cycling the access-point and client supplicant services
//! - Scanning for nearby networks

mod configurator;

pub use configurator::{NetworkConfigurator, NetworkError, WifiOutcome};
