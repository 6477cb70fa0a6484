//! Network configurator - applies wifi credentials and scans for networks

use crate::command::{CommandLine, CommandReport, CommandRunner};
use crate::config::NetworkConfig;
use device_agent_shared::wireless::parse_scan_output;
use device_agent_shared::{CredentialFormatError, NetworkEntry, WifiCredential};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that stop a wifi apply before any service is touched
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] CredentialFormatError),

    #[error("Failed to write supplicant profile {path}: {source}")]
    WriteProfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a wifi apply request
#[derive(Debug)]
pub enum WifiOutcome {
    /// Empty passphrase, nothing written
    Ignored,
    /// Profile written and every service step attempted
    Applied { steps: Vec<CommandReport> },
}

/// Drives the supplicant profile and the wireless services
pub struct NetworkConfigurator {
    runner: Arc<dyn CommandRunner>,
    config: NetworkConfig,
}

impl NetworkConfigurator {
    pub fn new(runner: Arc<dyn CommandRunner>, config: NetworkConfig) -> Self {
        Self { runner, config }
    }

    /// Write the profile for `credential` and switch the interface to client mode
    ///
    /// The access-point service is stopped before the client services start.
    /// Steps are not rolled back; every step runs even if an earlier one
    /// failed.
    pub async fn apply_wifi(&self, credential: &WifiCredential) -> Result<WifiOutcome, NetworkError> {
        if credential.is_empty() {
            info!(ssid = %credential.ssid, "empty passphrase, wifi request ignored");
            return Ok(WifiOutcome::Ignored);
        }

        let profile = credential.render_profile()?;
        let path = &self.config.supplicant_config;
        tokio::fs::write(path, profile)
            .await
            .map_err(|source| NetworkError::WriteProfile {
                path: path.clone(),
                source,
            })?;
        info!(ssid = %credential.ssid, path = %path.display(), "supplicant profile written");

        let mut steps = Vec::new();
        steps.push(self.systemctl(["daemon-reload"]).await);
        steps.push(self.systemctl(["stop", self.config.ap_service.as_str()]).await);
        steps.push(
            self.systemctl(["enable", "--now", self.config.client_service.as_str()])
                .await,
        );

        // Give the interface time to leave AP mode
        tokio::time::sleep(self.config.settle_delay()).await;

        steps.push(
            self.systemctl(["enable", self.config.interface_service.as_str()])
                .await,
        );
        steps.push(
            self.systemctl(["restart", self.config.interface_service.as_str()])
                .await,
        );

        let failed = steps.iter().filter(|s| !s.succeeded()).count();
        if failed > 0 {
            warn!(ssid = %credential.ssid, failed, "wifi service steps failed");
        } else {
            info!(ssid = %credential.ssid, "wifi client mode enabled");
        }

        Ok(WifiOutcome::Applied { steps })
    }

    /// Scan for networks visible on the configured interface
    pub async fn scan(&self) -> Vec<NetworkEntry> {
        let command = CommandLine::new("iw")
            .arg(self.config.interface.as_str())
            .arg("scan");
        let output = self.runner.run(&command).await;
        if !output.success() {
            warn!(
                interface = %self.config.interface,
                exit_code = ?output.exit_code,
                "wifi scan failed"
            );
        }

        let networks = parse_scan_output(&output.stdout);
        info!(count = networks.len(), "wifi scan complete");
        networks
    }

    async fn systemctl<const N: usize>(&self, args: [&str; N]) -> CommandReport {
        let command = CommandLine::new("systemctl").args(args);
        let output = self.runner.run(&command).await;
        CommandReport { command, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::command::CommandOutput;

    fn test_config(dir: &tempfile::TempDir) -> NetworkConfig {
        NetworkConfig {
            supplicant_config: dir.path().join("wpa_supplicant-wlan0.conf"),
            settle_delay_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_passphrase_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let config = test_config(&dir);
        let profile_path = config.supplicant_config.clone();
        let configurator = NetworkConfigurator::new(runner.clone(), config);

        let outcome = configurator
            .apply_wifi(&WifiCredential::new("Office", ""))
            .await
            .unwrap();

        assert!(matches!(outcome, WifiOutcome::Ignored));
        assert!(runner.calls().is_empty());
        assert!(!profile_path.exists());
    }

    #[tokio::test]
    async fn test_apply_writes_profile_then_cycles_services() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let config = test_config(&dir);
        let profile_path = config.supplicant_config.clone();
        std::fs::write(&profile_path, "stale content that must disappear\n").unwrap();
        let configurator = NetworkConfigurator::new(runner.clone(), config);

        let outcome = configurator
            .apply_wifi(&WifiCredential::new("Office", "hunter22"))
            .await
            .unwrap();
        let WifiOutcome::Applied { steps } = outcome else {
            panic!("expected applied outcome");
        };
        assert!(steps.iter().all(CommandReport::succeeded));

        let profile = std::fs::read_to_string(&profile_path).unwrap();
        assert!(!profile.contains("stale"));
        assert!(profile.contains("  ssid=\"Office\"\n"));
        assert!(profile.contains("  psk=\"hunter22\"\n"));

        assert_eq!(
            runner.call_lines(),
            vec![
                "systemctl daemon-reload",
                "systemctl stop wpa_supplicant-ap.service",
                "systemctl enable --now wpa_supplicant.service",
                "systemctl enable wpa_supplicant@wlan0.service",
                "systemctl restart wpa_supplicant@wlan0.service",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_step_does_not_stop_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        runner.respond("stop wpa_supplicant-ap", CommandOutput::exited(5, ""));
        let configurator = NetworkConfigurator::new(runner.clone(), test_config(&dir));

        let outcome = configurator
            .apply_wifi(&WifiCredential::new("Office", "hunter22"))
            .await
            .unwrap();

        let WifiOutcome::Applied { steps } = outcome else {
            panic!("expected applied outcome");
        };
        assert_eq!(steps.iter().filter(|s| !s.succeeded()).count(), 1);
        assert_eq!(runner.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_credential_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let config = test_config(&dir);
        let profile_path = config.supplicant_config.clone();
        let configurator = NetworkConfigurator::new(runner.clone(), config);

        let result = configurator
            .apply_wifi(&WifiCredential::new("Office", "a\nnetwork={"))
            .await;

        assert!(matches!(result, Err(NetworkError::InvalidCredential(_))));
        assert!(runner.calls().is_empty());
        assert!(!profile_path.exists());
    }

    #[tokio::test]
    async fn test_scan_parses_runner_output() {
        let runner = RecordingRunner::new();
        runner.respond(
            "iw wlan0 scan",
            CommandOutput::exited(0, "BSS 00:11(on wlan0)\n\tSSID: foo\n\tSSID: \n\tSSID: bar\n"),
        );
        let configurator = NetworkConfigurator::new(runner.clone(), NetworkConfig::default());

        let names: Vec<String> = configurator.scan().await.into_iter().map(|n| n.name).collect();

        assert_eq!(names, vec!["foo", "bar"]);
        assert_eq!(runner.call_lines(), vec!["iw wlan0 scan"]);
    }
}
