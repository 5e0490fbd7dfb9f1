//! Runtime choice between real Bluetooth and the simulator

use uuid::Uuid;

#[cfg(feature = "ble")]
use crate::btle::{BleCentral, BleLink};
use crate::simulated::{SimulatedCentral, SimulatedLink};
use crate::transport::{Central, DeviceId, Discovery, Link, Notifications};
use crate::Result;

/// Whichever central this host ended up with
#[derive(Debug, Clone)]
pub enum AnyCentral {
    #[cfg(feature = "ble")]
    Ble(BleCentral),
    Simulated(SimulatedCentral),
}

#[derive(Debug, Clone)]
pub enum AnyLink {
    #[cfg(feature = "ble")]
    Ble(BleLink),
    Simulated(SimulatedLink),
}

/// Pick the transport.
///
/// Uses the first Bluetooth adapter unless `force_simulated` is set. When no
/// adapter can be opened, or the crate was built without the `ble` feature,
/// falls back to `simulated`.
pub async fn select_central(force_simulated: bool, simulated: SimulatedCentral) -> AnyCentral {
    if force_simulated {
        log::info!("using simulated frames");
        return AnyCentral::Simulated(simulated);
    }

    if let Some(central) = open_adapter().await {
        return central;
    }
    AnyCentral::Simulated(simulated)
}

#[cfg(feature = "ble")]
async fn open_adapter() -> Option<AnyCentral> {
    match BleCentral::first_adapter().await {
        Ok(central) => Some(AnyCentral::Ble(central)),
        Err(e) => {
            log::warn!("Bluetooth unavailable ({e}), using simulated frames");
            None
        }
    }
}

#[cfg(not(feature = "ble"))]
async fn open_adapter() -> Option<AnyCentral> {
    log::warn!("built without Bluetooth support, using simulated frames");
    None
}

impl AnyCentral {
    pub fn is_simulated(&self) -> bool {
        matches!(self, AnyCentral::Simulated(_))
    }
}

impl Central for AnyCentral {
    type Link = AnyLink;

    async fn is_powered_on(&self) -> Result<bool> {
        match self {
            #[cfg(feature = "ble")]
            AnyCentral::Ble(c) => c.is_powered_on().await,
            AnyCentral::Simulated(c) => c.is_powered_on().await,
        }
    }

    async fn start_discovery(&self, service: Uuid) -> Result<Discovery> {
        match self {
            #[cfg(feature = "ble")]
            AnyCentral::Ble(c) => c.start_discovery(service).await,
            AnyCentral::Simulated(c) => c.start_discovery(service).await,
        }
    }

    async fn stop_discovery(&self) -> Result<()> {
        match self {
            #[cfg(feature = "ble")]
            AnyCentral::Ble(c) => c.stop_discovery().await,
            AnyCentral::Simulated(c) => c.stop_discovery().await,
        }
    }

    async fn connect(&self, id: &DeviceId) -> Result<AnyLink> {
        match self {
            #[cfg(feature = "ble")]
            AnyCentral::Ble(c) => c.connect(id).await.map(AnyLink::Ble),
            AnyCentral::Simulated(c) => c.connect(id).await.map(AnyLink::Simulated),
        }
    }

    async fn shutdown(&self) {
        match self {
            #[cfg(feature = "ble")]
            AnyCentral::Ble(c) => c.shutdown().await,
            AnyCentral::Simulated(c) => c.shutdown().await,
        }
    }
}

impl Link for AnyLink {
    fn id(&self) -> &DeviceId {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.id(),
            AnyLink::Simulated(l) => l.id(),
        }
    }

    fn characteristics(&self) -> Vec<Uuid> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.characteristics(),
            AnyLink::Simulated(l) => l.characteristics(),
        }
    }

    fn hardware_address(&self) -> Option<String> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.hardware_address(),
            AnyLink::Simulated(l) => l.hardware_address(),
        }
    }

    async fn read(&self, characteristic: Uuid) -> Result<Option<Vec<u8>>> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.read(characteristic).await,
            AnyLink::Simulated(l) => l.read(characteristic).await,
        }
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.write(characteristic, payload).await,
            AnyLink::Simulated(l) => l.write(characteristic, payload).await,
        }
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<Notifications> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.subscribe(characteristic).await,
            AnyLink::Simulated(l) => l.subscribe(characteristic).await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            #[cfg(feature = "ble")]
            AnyLink::Ble(l) => l.disconnect().await,
            AnyLink::Simulated(l) => l.disconnect().await,
        }
    }
}
