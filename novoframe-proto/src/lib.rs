//! NovoFrame provisioning protocol - GATT layout and status payloads
//!
//! Shared by everything that talks to a frame in setup mode: the host-side
//! controller, the simulated frame, and the CLI.

pub mod ble;
mod status;

pub use status::{ProvisioningStatus, StatusDecodeError, StatusPayload, UnknownStatus};
