//! Agent configuration
//!
//! Every field has a default matching the appliance layout, so an empty or
//! missing configuration file yields a working agent.

use anyhow::{Context, Result};
use device_agent_shared::paths;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub services: ServiceConfig,
    pub update: UpdateConfig,
    pub credentials: CredentialConfig,
    pub logs: LogConfig,
    pub system: SystemConfig,
}

impl AgentConfig {
    /// Load from `path`, or use defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Largest accepted update upload
    pub max_bundle_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8456)),
            max_bundle_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Wireless client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub interface: String,
    pub supplicant_config: PathBuf,
    pub ap_service: String,
    pub client_service: String,
    pub interface_service: String,
    /// Wait between enabling the client service and the interface unit
    pub settle_delay_ms: u64,
}

impl NetworkConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: paths::WIFI_INTERFACE.into(),
            supplicant_config: paths::SUPPLICANT_CONFIG.into(),
            ap_service: paths::AP_SERVICE.into(),
            client_service: paths::CLIENT_SERVICE.into(),
            interface_service: paths::INTERFACE_SERVICE.into(),
            settle_delay_ms: paths::WIFI_SETTLE_DELAY_MS,
        }
    }
}

/// Container orchestration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub compose_file: PathBuf,
    pub compose_program: String,
    pub docker_program: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            compose_file: paths::COMPOSE_FILE.into(),
            compose_program: "docker-compose".into(),
            docker_program: "docker".into(),
        }
    }
}

/// Firmware update settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub staging_path: PathBuf,
    pub first_boot_marker: PathBuf,
    pub installer_program: String,
    pub reboot_program: String,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            staging_path: paths::BUNDLE_STAGING.into(),
            first_boot_marker: paths::FIRST_BOOT_MARKER.into(),
            installer_program: "rauc".into(),
            reboot_program: "reboot".into(),
        }
    }
}

/// SSH key store location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub ssh_dir: PathBuf,
}

impl CredentialConfig {
    pub fn authorized_keys(&self) -> PathBuf {
        self.ssh_dir.join("authorized_keys")
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        let ssh_dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".ssh"))
            .unwrap_or_else(|| PathBuf::from(paths::DEFAULT_SSH_DIR));
        Self { ssh_dir }
    }
}

/// Log streaming settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Lines buffered between the tailing process and the HTTP response
    pub channel_capacity: usize,
    /// How often to re-check a process that closed its output but still runs
    pub exit_poll_ms: u64,
}

impl LogConfig {
    pub fn exit_poll(&self) -> Duration {
        Duration::from_millis(self.exit_poll_ms)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            exit_poll_ms: 100,
        }
    }
}

/// Host information sources
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub os_release: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            os_release: paths::OS_RELEASE.into(),
        }
    }
}
