//! BLE GATT Service Protocol Constants for NovoFrame Provisioning
//!
//! These values must match the frame firmware. UUIDs are given as `u128` so
//! that host crates can build `uuid::Uuid` values with `Uuid::from_u128` in
//! const context.

/// Provisioning service: 4e461000-7072-6f76-6973-696f6e000000
pub const SERVICE_UUID: u128 = 0x4e461000_7072_6f76_6973_696f6e000000;

/// WiFi SSID characteristic (write, UTF-8)
pub const WIFI_SSID_UUID: u128 = 0x4e461001_7072_6f76_6973_696f6e000000;

/// WiFi password characteristic (write, UTF-8)
pub const WIFI_PASS_UUID: u128 = 0x4e461002_7072_6f76_6973_696f6e000000;

/// Encryption key characteristic (write, 64 lowercase hex characters)
pub const ENCRYPTION_KEY_UUID: u128 = 0x4e461003_7072_6f76_6973_696f6e000000;

/// Status characteristic (notify, `{"status": "..."}`)
pub const STATUS_UUID: u128 = 0x4e461004_7072_6f76_6973_696f6e000000;

/// MAC address characteristic (read, UTF-8 `AA:BB:CC:DD:EE:FF`)
///
/// Newer firmware exposes it; older frames only advertise their identity.
pub const MAC_ADDRESS_UUID: u128 = 0x4e461005_7072_6f76_6973_696f6e000000;

/// Local name advertised by a frame waiting to be provisioned
pub const SETUP_NAME: &str = "NovoFrame-Setup";

/// RSSI reported when an advertisement carries none
pub const UNKNOWN_RSSI: i16 = -100;

/// Reference timings, in milliseconds
pub mod timing {
    /// How long a scan runs before completing on its own
    pub const SCAN_TIMEOUT_MS: u64 = 15_000;

    /// How long to wait for the frame to report `wifi_connected`
    pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 30_000;

    /// Gap between consecutive credential writes; the frame cannot buffer
    /// back-to-back writes
    pub const WRITE_PACING_MS: u64 = 500;

    /// Gap between status transitions emitted by the simulated frame
    pub const SIMULATED_STATUS_STEP_MS: u64 = 800;
}
