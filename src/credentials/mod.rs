//! SSH credential installation

mod installer;

pub use installer::{CredentialError, CredentialInstaller, InstallOutcome};
