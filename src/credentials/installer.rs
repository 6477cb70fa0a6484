//! Credential installer - appends public keys to the authorized keys file

use crate::config::CredentialConfig;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Owner read/write only
const KEY_FILE_MODE: u32 = 0o600;

/// Owner only, applied when the directory is created
const SSH_DIR_MODE: u32 = 0o700;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Public key contains a line break or control character")]
    InvalidKey,

    #[error("Failed to update {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No key supplied
    Missing,
    Installed,
}

/// Appends keys to `authorized_keys`; duplicates are not filtered
pub struct CredentialInstaller {
    config: CredentialConfig,
}

impl CredentialInstaller {
    pub fn new(config: CredentialConfig) -> Self {
        Self { config }
    }

    pub async fn install_key(&self, key: &str) -> Result<InstallOutcome, CredentialError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(InstallOutcome::Missing);
        }
        // One key per line; anything else would add entries or options
        if key.chars().any(char::is_control) {
            return Err(CredentialError::InvalidKey);
        }

        let dir = &self.config.ssh_dir;
        if !fs::try_exists(dir).await.unwrap_or(false) {
            fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;
            fs::set_permissions(dir, Permissions::from_mode(SSH_DIR_MODE))
                .await
                .map_err(|e| io_error(dir, e))?;
        }

        let path = self.config.authorized_keys();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        file.write_all(format!("{}\n", key).as_bytes())
            .await
            .map_err(|e| io_error(&path, e))?;
        file.flush().await.map_err(|e| io_error(&path, e))?;

        fs::set_permissions(&path, Permissions::from_mode(KEY_FILE_MODE))
            .await
            .map_err(|e| io_error(&path, e))?;

        info!(path = %path.display(), "ssh key installed");
        Ok(InstallOutcome::Installed)
    }
}

fn io_error(path: &std::path::Path, source: std::io::Error) -> CredentialError {
    CredentialError::Io {
        path: path.to_path_buf(),
        source,
    }
}
