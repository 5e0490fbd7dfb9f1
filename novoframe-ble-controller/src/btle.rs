//! Real Bluetooth transport on top of btleplug

use btleplug::api::{
    BDAddr, Central as _, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use uuid::Uuid;

use crate::transport::{
    Advertisement, Central, DeviceId, Discovery, Link, Notifications, SERVICE, skip_failed_lookup,
};
use crate::{Error, Result};

/// The host's Bluetooth adapter
#[derive(Debug, Clone)]
pub struct BleCentral {
    adapter: Adapter,
}

impl BleCentral {
    /// Get the first Bluetooth adapter
    pub async fn first_adapter() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters.into_iter().next().ok_or(Error::NoAdapter)?;
        log::debug!("using adapter {}", adapter.adapter_info().await.unwrap_or_default());
        Ok(Self { adapter })
    }

    async fn find(&self, id: &DeviceId) -> Result<Peripheral> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.id().to_string() == id.as_str() {
                return Ok(peripheral);
            }
        }
        Err(Error::DeviceNotFound(id.to_string()))
    }
}

async fn advertisement(adapter: &Adapter, id: &PeripheralId) -> Result<Option<Advertisement>> {
    let peripheral = adapter.peripheral(id).await?;
    let Some(props) = peripheral.properties().await? else {
        return Ok(None);
    };
    Ok(Some(Advertisement {
        id: DeviceId::new(id.to_string()),
        local_name: props.local_name,
        rssi: props.rssi,
        services: props.services,
    }))
}

impl Central for BleCentral {
    type Link = BleLink;

    async fn is_powered_on(&self) -> Result<bool> {
        Ok(self.adapter.adapter_state().await? == CentralState::PoweredOn)
    }

    async fn start_discovery(&self, service: Uuid) -> Result<Discovery> {
        // Subscribe before scanning so no early advertisement is missed
        let events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter { services: vec![service] })
            .await?;

        let adapter = self.adapter.clone();
        let discovery = events
            .filter_map(|event| async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => Some(id),
                    CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
                    _ => None,
                }
            })
            .then(move |id| {
                let adapter = adapter.clone();
                async move { advertisement(&adapter, &id).await }
            })
            .filter_map(|result| async move { skip_failed_lookup(result) })
            .boxed();
        Ok(discovery)
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, id: &DeviceId) -> Result<BleLink> {
        let peripheral = self.find(id).await?;
        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        if let Err(e) = peripheral.discover_services().await {
            if let Err(e) = peripheral.disconnect().await {
                log::warn!("disconnect after failed service discovery: {e}");
            }
            return Err(e.into());
        }
        Ok(BleLink {
            id: id.clone(),
            peripheral,
        })
    }

    async fn shutdown(&self) {
        if let Err(e) = self.adapter.stop_scan().await {
            log::debug!("stop_scan during shutdown: {e}");
        }
    }
}

/// Connected frame
#[derive(Debug, Clone)]
pub struct BleLink {
    id: DeviceId,
    peripheral: Peripheral,
}

impl BleLink {
    fn characteristic(&self, uuid: Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid && c.service_uuid == SERVICE)
    }

    fn require(&self, uuid: Uuid) -> Result<Characteristic> {
        self.characteristic(uuid).ok_or(Error::CharacteristicNotFound(uuid))
    }
}

impl Link for BleLink {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn characteristics(&self) -> Vec<Uuid> {
        self.peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == SERVICE)
            .map(|c| c.uuid)
            .collect()
    }

    fn hardware_address(&self) -> Option<String> {
        // CoreBluetooth hides the address and reports all zeros
        let address = self.peripheral.address();
        (address != BDAddr::default()).then(|| address.to_string())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Option<Vec<u8>>> {
        match self.characteristic(characteristic) {
            Some(c) => Ok(Some(self.peripheral.read(&c).await?)),
            None => Ok(None),
        }
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let c = self.require(characteristic)?;
        self.peripheral.write(&c, payload, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<Notifications> {
        let c = self.require(characteristic)?;
        let notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&c).await?;
        Ok(notifications
            .filter_map(move |n| async move { (n.uuid == characteristic).then_some(n.value) })
            .boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}
