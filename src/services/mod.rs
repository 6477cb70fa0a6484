//! Container service control
//!
//! Maps operator actions onto the compose CLI and the container runtime,
//! and lists what is currently deployed.

mod controller;

pub use controller::{ServiceController, TargetReport};
