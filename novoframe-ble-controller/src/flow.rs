//! The setup flow: scan, provision, remember the key, pair
//!
//! [`SetupFlow`] owns at most one session at a time. Starting a scan or a new
//! provisioning attempt first tears the previous session down, and every
//! provisioning attempt disconnects before it returns, whatever the outcome.

use std::fmt;
use std::time::Duration;

use novoframe_proto::{ProvisioningStatus, ble};

use crate::api::{Frame, FrameApi, PairError};
use crate::key::EncryptionKey;
use crate::keystore::{KeyStore, KeyStoreError};
use crate::provisioner::Provisioner;
use crate::scanner::DiscoveredDevice;
use crate::session::Session;
use crate::transport::{Central, DeviceId};
use crate::Error;

/// What the user should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// Scan again and pick the frame
    Rescan,
    /// Re-enter the WiFi network and password
    ChangeWifi,
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Please enter WiFi SSID and password")]
    InvalidCredentials,
    #[error("Please enter a name for your frame")]
    InvalidName,
    #[error("Bluetooth is turned off")]
    BluetoothOff,
    #[error(transparent)]
    Provisioning(#[from] Error),
    #[error("could not store the frame key: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Pair(#[from] PairError),
}

impl SetupError {
    pub fn remedy(&self) -> Remedy {
        match self {
            SetupError::InvalidCredentials => Remedy::ChangeWifi,
            SetupError::Provisioning(Error::DeviceFailed(ProvisioningStatus::WifiFailed)) => Remedy::ChangeWifi,
            _ => Remedy::Rescan,
        }
    }
}

/// Network the frame should join
#[derive(Clone)]
pub struct WifiCredentials {
    ssid: String,
    password: String,
}

impl WifiCredentials {
    /// Both fields must contain something other than whitespace
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, SetupError> {
        let (ssid, password) = (ssid.into(), password.into());
        if ssid.trim().is_empty() || password.trim().is_empty() {
            return Err(SetupError::InvalidCredentials);
        }
        Ok(Self { ssid, password })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .finish()
    }
}

/// A frame that joined WiFi and whose key is now stored locally
#[derive(Debug, Clone)]
pub struct ProvisionedFrame {
    pub mac_address: String,
    pub encryption_key: EncryptionKey,
}

pub struct SetupFlow<C: Central, K: KeyStore> {
    provisioner: Provisioner<C>,
    keys: K,
    scan_timeout: Duration,
    wifi_timeout: Duration,
    session: Option<Session<C::Link>>,
}

impl<C: Central, K: KeyStore> SetupFlow<C, K> {
    /// Flow with the default scan and WiFi timeouts
    pub fn new(provisioner: Provisioner<C>, keys: K) -> Self {
        Self {
            provisioner,
            keys,
            scan_timeout: Duration::from_millis(ble::timing::SCAN_TIMEOUT_MS),
            wifi_timeout: Duration::from_millis(ble::timing::WIFI_CONNECT_TIMEOUT_MS),
            session: None,
        }
    }

    /// How long each scan runs
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// How long to wait for the frame to report `wifi_connected`
    pub fn with_wifi_timeout(mut self, timeout: Duration) -> Self {
        self.wifi_timeout = timeout;
        self
    }

    pub fn provisioner(&self) -> &Provisioner<C> {
        &self.provisioner
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub async fn bluetooth_ready(&self) -> Result<(), SetupError> {
        if self.provisioner.is_enabled().await? {
            Ok(())
        } else {
            Err(SetupError::BluetoothOff)
        }
    }

    /// Scan for frames, reporting each one as it shows up
    pub async fn scan<F>(&mut self, mut on_found: F) -> Result<Vec<DiscoveredDevice>, SetupError>
    where
        F: FnMut(&DiscoveredDevice),
    {
        self.disconnect().await;
        let mut found = Vec::new();
        self.provisioner
            .scan(
                |device| {
                    on_found(&device);
                    found.push(device);
                },
                self.scan_timeout,
            )
            .await?;
        Ok(found)
    }

    /// Provision one frame with a freshly generated key.
    ///
    /// `on_status` sees every status the frame reports. The key is stored
    /// under the frame's MAC only once the frame reports `wifi_connected`.
    pub async fn provision<F>(
        &mut self,
        device: &DeviceId,
        credentials: &WifiCredentials,
        on_status: F,
    ) -> Result<ProvisionedFrame, SetupError>
    where
        F: FnMut(ProvisioningStatus),
    {
        self.disconnect().await;
        let key = EncryptionKey::generate();
        log::info!("provisioning {device} with key {}", key.fingerprint());

        let session = self.session.insert(self.provisioner.connect(device).await?);
        let outcome = deliver(&self.provisioner, session, credentials, &key, self.wifi_timeout, on_status).await;
        self.disconnect().await;

        let mac_address = outcome?;
        self.keys.save_encryption_key(&mac_address, &key)?;
        log::info!("frame {mac_address} is on WiFi");
        Ok(ProvisionedFrame {
            mac_address,
            encryption_key: key,
        })
    }

    /// Register a provisioned frame with the backend under `name`
    pub async fn pair<A: FrameApi>(&self, api: &A, mac_address: &str, name: &str) -> Result<Frame, SetupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SetupError::InvalidName);
        }
        Ok(api.pair_frame(mac_address, name).await?)
    }

    /// Stop any scan and drop the current session. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.provisioner.stop_scan().await;
        if let Some(session) = self.session.take() {
            self.provisioner.disconnect(session).await;
        }
    }

    /// Disconnect and release the central
    pub async fn teardown(&mut self) {
        self.disconnect().await;
        self.provisioner.teardown().await;
    }
}

async fn deliver<C, F>(
    provisioner: &Provisioner<C>,
    session: &mut Session<C::Link>,
    credentials: &WifiCredentials,
    key: &EncryptionKey,
    wifi_timeout: Duration,
    on_status: F,
) -> Result<String, Error>
where
    C: Central,
    F: FnMut(ProvisioningStatus),
{
    let mac_address = provisioner.mac_address(session).await;
    provisioner
        .configure(session, credentials.ssid(), credentials.password(), key)
        .await?;
    provisioner
        .wait_for_status_with(session, ProvisioningStatus::WifiConnected, wifi_timeout, on_status)
        .await?;
    Ok(mac_address)
}
