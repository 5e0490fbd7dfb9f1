use std::time::Duration;

use novoframe_proto::ProvisioningStatus;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "ble")]
    #[error("Bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// The frame did not report `status` in time
    #[error("timeout waiting for status: {status} (after {after:?})")]
    Timeout {
        status: ProvisioningStatus,
        after: Duration,
    },

    /// The frame itself reported `wifi_failed` or `error`
    #[error("setup failed with status: {0}")]
    DeviceFailed(ProvisioningStatus),

    #[error("device disconnected")]
    Disconnected,
}

impl Error {
    pub(crate) fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
