//! Provisioning status reported by the frame over the STATUS characteristic

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Progress of a frame through provisioning.
///
/// Variants are declared in the order they are expected on the success path,
/// so the derived `Ord` is the progression order. `WifiConnected` is terminal
/// success; `WifiFailed` and `Error` are terminal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    #[default]
    Idle,
    Connecting,
    SsidReceived,
    PasswordReceived,
    KeyReceived,
    CredentialsSaved,
    ConnectingWifi,
    WifiConnected,
    WifiFailed,
    Error,
}

impl ProvisioningStatus {
    /// Every status a frame reports on a successful run, in order, after `Idle`
    pub const SUCCESS_PATH: [ProvisioningStatus; 7] = [
        ProvisioningStatus::Connecting,
        ProvisioningStatus::SsidReceived,
        ProvisioningStatus::PasswordReceived,
        ProvisioningStatus::KeyReceived,
        ProvisioningStatus::CredentialsSaved,
        ProvisioningStatus::ConnectingWifi,
        ProvisioningStatus::WifiConnected,
    ];

    /// Device-reported failure; any pending wait fails on these
    pub fn is_failure(self) -> bool {
        matches!(self, Self::WifiFailed | Self::Error)
    }

    /// Nothing follows this status in one provisioning attempt
    pub fn is_terminal(self) -> bool {
        self == Self::WifiConnected || self.is_failure()
    }

    /// Wire name, as sent in the `status` field
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::SsidReceived => "ssid_received",
            Self::PasswordReceived => "password_received",
            Self::KeyReceived => "key_received",
            Self::CredentialsSaved => "credentials_saved",
            Self::ConnectingWifi => "connecting_wifi",
            Self::WifiConnected => "wifi_connected",
            Self::WifiFailed => "wifi_failed",
            Self::Error => "error",
        }
    }

    /// Human readable progress line for the person pairing the frame
    pub fn message(self) -> &'static str {
        match self {
            Self::Idle => "Configuring...",
            Self::Connecting => "Connecting to frame...",
            Self::SsidReceived => "Sending WiFi credentials...",
            Self::PasswordReceived => "WiFi password sent...",
            Self::KeyReceived => "Sending encryption key...",
            Self::CredentialsSaved => "Configuration saved...",
            Self::ConnectingWifi => "Frame connecting to WiFi...",
            Self::WifiConnected => "✓ Setup complete!",
            Self::WifiFailed => "✗ WiFi connection failed",
            Self::Error => "✗ Setup error",
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown provisioning status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for ProvisioningStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| UnknownStatus(s.to_string()))
    }
}

/// JSON body of a STATUS notification: `{"status": "wifi_connected"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: ProvisioningStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum StatusDecodeError {
    #[error("empty status notification")]
    Empty,
    #[error("invalid status payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatusPayload {
    pub fn new(status: ProvisioningStatus) -> Self {
        Self { status }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(r#"{{"status":"{}"}}"#, self.status).into_bytes()
    }

    /// Decode a notification value.
    ///
    /// Some firmware builds pad the characteristic value with NUL bytes, so
    /// trailing zeros are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, StatusDecodeError> {
        let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let data = &data[..end];
        if data.is_empty() {
            return Err(StatusDecodeError::Empty);
        }
        Ok(serde_json::from_slice(data)?)
    }
}
