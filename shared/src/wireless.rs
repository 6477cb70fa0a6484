//! Wireless client profile and scan parsing

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header lines written before the network block
const PROFILE_HEADER: [&str; 3] = [
    "ctrl_interface=/var/run/wpa_supplicant",
    "ctrl_interface_group=0",
    "update_config=1",
];

/// Fixed security parameters of every network block
pub const SECURITY_PARAMETERS: [&str; 5] = [
    "key_mgmt=WPA-PSK",
    "proto=WPA2",
    "pairwise=CCMP TKIP",
    "group=CCMP TKIP",
    "scan_ssid=1",
];

/// Marker preceding the network name in scan output
const SCAN_SSID_MARKER: &str = "SSID:";

/// Errors raised when a credential cannot be rendered safely
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialFormatError {
    #[error("{field} contains a line break or control character")]
    ControlCharacter { field: &'static str },

    #[error("{field} contains a double quote")]
    Quote { field: &'static str },
}

/// SSID and passphrase requested by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredential {
    pub ssid: String,
    pub passphrase: String,
}

impl WifiCredential {
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            passphrase: passphrase.into(),
        }
    }

    /// An empty passphrase means "nothing to apply"
    pub fn is_empty(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// Reject values that would add lines to the profile or end a quoted
    /// value early
    pub fn validate(&self) -> Result<(), CredentialFormatError> {
        check_field("ssid", &self.ssid)?;
        check_field("passphrase", &self.passphrase)
    }

    /// Render the full supplicant profile for this credential
    pub fn render_profile(&self) -> Result<String, CredentialFormatError> {
        self.validate()?;

        let mut out = String::new();
        for line in PROFILE_HEADER {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out.push_str("network={\n");
        out.push_str(&format!("  ssid=\"{}\"\n", self.ssid));
        out.push_str(&format!("  psk=\"{}\"\n", self.passphrase));
        for param in SECURITY_PARAMETERS {
            out.push_str("  ");
            out.push_str(param);
            out.push('\n');
        }
        out.push_str("}\n");

        Ok(out)
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), CredentialFormatError> {
    if value.chars().any(char::is_control) {
        return Err(CredentialFormatError::ControlCharacter { field });
    }
    if value.contains('"') {
        return Err(CredentialFormatError::Quote { field });
    }
    Ok(())
}

/// A network seen by the scan tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub name: String,
}

/// Extract SSIDs from scan tool output
///
/// Only lines whose first token is `SSID:` count, so `HESSID:` entries are
/// skipped. Order follows the output; duplicates are kept and blank names
/// dropped.
pub fn parse_scan_output(output: &str) -> Vec<NetworkEntry> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim_start().strip_prefix(SCAN_SSID_MARKER)?;
            let name = rest.trim();
            if name.is_empty() {
                None
            } else {
                Some(NetworkEntry { name: name.to_string() })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_starting_with<'a>(profile: &'a str, prefix: &str) -> Vec<&'a str> {
        profile
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with(prefix))
            .collect()
    }

    #[test]
    fn test_profile_contains_credential_once() {
        let cred = WifiCredential::new("HomeNet", "s3cret pass");
        let profile = cred.render_profile().unwrap();

        assert_eq!(lines_starting_with(&profile, "ssid="), vec!["ssid=\"HomeNet\""]);
        assert_eq!(lines_starting_with(&profile, "psk="), vec!["psk=\"s3cret pass\""]);
        for param in SECURITY_PARAMETERS {
            assert!(profile.contains(&format!("  {}\n", param)), "missing {}", param);
        }
        assert!(profile.starts_with("ctrl_interface=/var/run/wpa_supplicant\n"));
        assert!(profile.contains("\nnetwork={\n"));
        assert!(profile.ends_with("}\n"));
    }

    #[test]
    fn test_line_break_rejected() {
        let cred = WifiCredential::new("net", "pass\n  psk=\"other\"");
        assert_eq!(
            cred.render_profile(),
            Err(CredentialFormatError::ControlCharacter { field: "passphrase" })
        );

        let cred = WifiCredential::new("net\r", "password");
        assert!(cred.validate().is_err());
    }

    #[test]
    fn test_double_quote_rejected() {
        let cred = WifiCredential::new("a\"b", "password");
        assert_eq!(
            cred.render_profile(),
            Err(CredentialFormatError::Quote { field: "ssid" })
        );

        let cred = WifiCredential::new("net", "pass\"word");
        assert_eq!(
            cred.validate(),
            Err(CredentialFormatError::Quote { field: "passphrase" })
        );
    }

    #[test]
    fn test_empty_passphrase() {
        assert!(WifiCredential::new("net", "").is_empty());
        assert!(!WifiCredential::new("", "x").is_empty());
    }

    #[test]
    fn test_scan_parsing_drops_blanks_and_keeps_order() {
        let output = "SSID: foo\n\nSSID: bar\n";
        let names = parse_scan_output(output);
        assert_eq!(
            names,
            vec![
                NetworkEntry { name: "foo".into() },
                NetworkEntry { name: "bar".into() },
            ]
        );
    }

    #[test]
    fn test_scan_parsing_real_output() {
        let output = "BSS aa:bb:cc:dd:ee:ff(on wlan0)\n\
                      \tfreq: 2412\n\
                      \tSSID: Office\n\
                      BSS 11:22:33:44:55:66(on wlan0)\n\
                      \tSSID: \n\
                      \t\tHESSID: 00:11:22:33:44:55\n\
                      BSS 77:88:99:aa:bb:cc(on wlan0)\n\
                      \tSSID: Office\n";
        let names: Vec<String> = parse_scan_output(output).into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["Office", "Office"]);
    }
}
