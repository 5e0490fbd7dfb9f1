//! Transport capability: what the provisioning protocol needs from a BLE stack
//!
//! A [`Central`] scans and connects; a [`Link`] is one connection to a frame.
//! The real implementation lives in `btle`, the simulated one in `simulated`.
//! Everything above this module (scanner, configurator, status monitor) is
//! written once against these traits, so both variants behave the same.

use std::fmt;
use std::future::Future;

use futures::stream::BoxStream;
use novoframe_proto::ble;
use uuid::Uuid;

use crate::Result;

/// Provisioning service UUID
pub const SERVICE: Uuid = Uuid::from_u128(ble::SERVICE_UUID);
/// WiFi SSID characteristic
pub const SSID: Uuid = Uuid::from_u128(ble::WIFI_SSID_UUID);
/// WiFi password characteristic
pub const PASSWORD: Uuid = Uuid::from_u128(ble::WIFI_PASS_UUID);
/// Encryption key characteristic
pub const ENCRYPTION_KEY: Uuid = Uuid::from_u128(ble::ENCRYPTION_KEY_UUID);
/// Status notification characteristic
pub const STATUS: Uuid = Uuid::from_u128(ble::STATUS_UUID);
/// Optional MAC address characteristic
pub const MAC_ADDRESS: Uuid = Uuid::from_u128(ble::MAC_ADDRESS_UUID);

/// Characteristics a frame must expose before a session counts as connected
pub const REQUIRED_CHARACTERISTICS: [Uuid; 4] = [SSID, PASSWORD, ENCRYPTION_KEY, STATUS];

/// Platform identity of a peripheral.
///
/// On Linux and Android this is derived from the Bluetooth address; on Apple
/// platforms it is a random per-host UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One advertisement as reported by the platform, before any filtering
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub id: DeviceId,
    pub local_name: Option<String>,
    pub rssi: Option<i16>,
    pub services: Vec<Uuid>,
}

/// Raw discovery events; an `Err` item ends the scan
pub type Discovery = BoxStream<'static, Result<Advertisement>>;

/// Drop a discovery event whose peripheral could not be looked up.
///
/// A device can vanish between its event and the lookup. Only that device is
/// lost; the scan carries on.
#[cfg_attr(not(feature = "ble"), allow(dead_code))]
pub(crate) fn skip_failed_lookup(lookup: Result<Option<Advertisement>>) -> Option<Result<Advertisement>> {
    match lookup {
        Ok(advertisement) => advertisement.map(Ok),
        Err(e) => {
            log::debug!("skipping peripheral after failed lookup: {e}");
            None
        }
    }
}

/// Raw values of one notifying characteristic; ends when the link drops
pub type Notifications = BoxStream<'static, Vec<u8>>;

/// Scanning side of the BLE stack
pub trait Central: Send + Sync {
    type Link: Link;

    /// Whether the radio is on and usable
    fn is_powered_on(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Start discovery for peripherals advertising `service`
    fn start_discovery(&self, service: Uuid) -> impl Future<Output = Result<Discovery>> + Send;

    /// Stop discovery. Must be safe to call when no discovery is running.
    fn stop_discovery(&self) -> impl Future<Output = Result<()>> + Send;

    /// Connect and resolve services and characteristics
    fn connect(&self, id: &DeviceId) -> impl Future<Output = Result<Self::Link>> + Send;

    /// Release stack resources held by the central itself
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// A connection to one peripheral
pub trait Link: Clone + Send + Sync + 'static {
    fn id(&self) -> &DeviceId;

    /// Resolved characteristics of the provisioning service
    fn characteristics(&self) -> Vec<Uuid>;

    /// Hardware address from the platform, if it exposes a real one
    fn hardware_address(&self) -> Option<String>;

    /// Read a characteristic; `None` when the peripheral does not have it
    fn read(&self, characteristic: Uuid) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Acknowledged write: resolves once the peripheral confirmed delivery
    fn write(&self, characteristic: Uuid, payload: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Enable notifications on a characteristic
    fn subscribe(&self, characteristic: Uuid) -> impl Future<Output = Result<Notifications>> + Send;

    /// Drop the connection. Must be safe to call more than once.
    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;
}
