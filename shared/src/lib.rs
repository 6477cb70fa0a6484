//! Device Agent Shared Types
//!
//! This crate provides the data model, output parsers and the update state
//! cell used by the device agent and its tests.

pub mod os_release;
pub mod service;
pub mod state;
pub mod wireless;

// Re-export commonly used types at crate root
pub use service::{
    ContainerAction, CustomActionRequest, RequestParseError, ServiceAction, ServiceActionRequest,
    ServiceDescriptor,
};
pub use state::{BeginUpdate, UpdateStateCell, UpdateStatus};
pub use wireless::{CredentialFormatError, NetworkEntry, WifiCredential};

/// Well-known locations and unit names on the appliance
pub mod paths {
    /// Supplicant profile for the client interface
    pub const SUPPLICANT_CONFIG: &str = "/etc/wpa_supplicant/wpa_supplicant-wlan0.conf";

    /// Wireless interface used for scanning and client mode
    pub const WIFI_INTERFACE: &str = "wlan0";

    /// Access-point mode supplicant unit
    pub const AP_SERVICE: &str = "wpa_supplicant-ap.service";

    /// Client mode supplicant unit
    pub const CLIENT_SERVICE: &str = "wpa_supplicant.service";

    /// Per-interface supplicant unit
    pub const INTERFACE_SERVICE: &str = "wpa_supplicant@wlan0.service";

    /// Compose file describing the managed services
    pub const COMPOSE_FILE: &str = "/home/root/mapio/docker-compose.yml";

    /// Where an uploaded bundle is staged before installation
    pub const BUNDLE_STAGING: &str = "/tmp/bundle.raucb";

    /// Marker removed after an update so the next boot provisions again
    pub const FIRST_BOOT_MARKER: &str = "/boot/first_boot_done";

    /// Host release descriptor
    pub const OS_RELEASE: &str = "/etc/os-release";

    /// Fallback SSH directory when `HOME` is not set
    pub const DEFAULT_SSH_DIR: &str = "/home/root/.ssh";

    /// Settle delay between enabling the client service and the interface unit
    pub const WIFI_SETTLE_DELAY_MS: u64 = 5000;
}
