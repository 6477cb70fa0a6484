//! Update manager - owns the update state and drives the bundle installer

use crate::command::{CommandLine, CommandReport, CommandRunner};
use crate::config::UpdateConfig;
use bytes::Bytes;
use device_agent_shared::{BeginUpdate, UpdateStateCell, UpdateStatus};
use futures::{Stream, StreamExt};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Errors raised after an update was accepted
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Failed to receive bundle: {0}")]
    Upload(String),

    #[error("Failed to stage bundle at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the installer and reboot commands reported
#[derive(Debug)]
pub struct UpdateReport {
    pub installer: CommandReport,
    pub reboot: CommandReport,
}

/// Result of an update submission
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Empty bundle, nothing done
    Ignored,
    /// An earlier submission already moved the device to updating
    AlreadyUpdating,
    /// Bundle installed (or attempted) and reboot issued
    Submitted(UpdateReport),
}

/// Accepts update bundles; at most one per process lifetime
pub struct UpdateManager {
    runner: Arc<dyn CommandRunner>,
    state: Arc<UpdateStateCell>,
    config: UpdateConfig,
}

impl UpdateManager {
    pub fn new(runner: Arc<dyn CommandRunner>, state: Arc<UpdateStateCell>, config: UpdateConfig) -> Self {
        Self {
            runner,
            state,
            config,
        }
    }

    pub fn status(&self) -> UpdateStatus {
        self.state.status()
    }

    /// Stage the bundle arriving on `chunks`, install it and reboot
    ///
    /// The bundle is written to the staging path chunk by chunk as it
    /// arrives. The state moves to `Updating` once the first bytes are in,
    /// before anything is written, so a failure while staging still reports
    /// that an update was attempted. The reboot is issued whatever the
    /// installer returned.
    pub async fn submit<S, E>(&self, chunks: S) -> Result<SubmitOutcome, UpdateError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut chunks = std::pin::pin!(chunks);

        let first = loop {
            match chunks.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => return Err(UpdateError::Upload(e.to_string())),
                None => {
                    info!("empty bundle, update request ignored");
                    return Ok(SubmitOutcome::Ignored);
                }
            }
        };

        if self.state.begin_update() == BeginUpdate::AlreadyUpdating {
            warn!("update already in progress, submission rejected");
            return Ok(SubmitOutcome::AlreadyUpdating);
        }
        info!("update accepted");

        let path = &self.config.staging_path;
        let staging_error = |source: std::io::Error| UpdateError::Staging {
            path: path.clone(),
            source,
        };
        let mut file = File::create(path).await.map_err(staging_error)?;
        file.write_all(&first).await.map_err(staging_error)?;
        let mut written = first.len() as u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| UpdateError::Upload(e.to_string()))?;
            file.write_all(&chunk).await.map_err(staging_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(staging_error)?;
        drop(file);
        info!(bytes = written, path = %path.display(), "bundle staged");

        let installer = self
            .run(
                CommandLine::new(self.config.installer_program.as_str())
                    .arg("install")
                    .arg(path.to_string_lossy()),
            )
            .await;
        if installer.succeeded() {
            info!(path = %path.display(), "bundle installed");
        } else {
            error!(
                path = %path.display(),
                exit_code = ?installer.output.exit_code,
                stderr = %installer.output.stderr.trim(),
                "bundle installation failed"
            );
        }

        self.clear_first_boot_marker().await;

        info!("rebooting device");
        let reboot = self.run(CommandLine::new(self.config.reboot_program.as_str())).await;

        Ok(SubmitOutcome::Submitted(UpdateReport { installer, reboot }))
    }

    /// Remove the marker so the next boot runs provisioning again
    async fn clear_first_boot_marker(&self) {
        let marker = &self.config.first_boot_marker;
        match tokio::fs::remove_file(marker).await {
            Ok(()) => info!(marker = %marker.display(), "first boot marker removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(marker = %marker.display(), error = %e, "failed to remove first boot marker"),
        }
    }

    async fn run(&self, command: CommandLine) -> CommandReport {
        let output = self.runner.run(&command).await;
        CommandReport { command, output }
    }
}
