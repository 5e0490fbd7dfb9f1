//! Instrumented transport for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use novoframe_proto::{ProvisioningStatus, StatusPayload};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::transport::{
    Advertisement, Central, DeviceId, Discovery, Link, Notifications, REQUIRED_CHARACTERISTICS, SERVICE,
};
use crate::{Error, Result};

pub(crate) fn advert(id: &str, name: &str, rssi: Option<i16>) -> Advertisement {
    Advertisement {
        id: DeviceId::from(id),
        local_name: Some(name.to_string()),
        rssi,
        services: vec![SERVICE],
    }
}

pub(crate) enum Scripted {
    Advert(Advertisement),
    Fail(&'static str),
}

pub(crate) struct FakeCentral {
    script: Mutex<Vec<Scripted>>,
    link: FakeLink,
    stop_discovery_calls: AtomicUsize,
    fail_stop: AtomicBool,
}

impl FakeCentral {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self::with_link(script, FakeLink::new("frame"))
    }

    pub(crate) fn with_link(script: Vec<Scripted>, link: FakeLink) -> Self {
        Self {
            script: Mutex::new(script),
            link,
            stop_discovery_calls: AtomicUsize::new(0),
            fail_stop: AtomicBool::new(false),
        }
    }

    pub(crate) fn stop_discovery_calls(&self) -> usize {
        self.stop_discovery_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_stop_discovery(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }
}

impl Central for FakeCentral {
    type Link = FakeLink;

    async fn is_powered_on(&self) -> Result<bool> {
        Ok(true)
    }

    async fn start_discovery(&self, _service: Uuid) -> Result<Discovery> {
        let items: Vec<Result<Advertisement>> = std::mem::take(&mut *self.script.lock().unwrap())
            .into_iter()
            .map(|s| match s {
                Scripted::Advert(a) => Ok(a),
                Scripted::Fail(msg) => Err(Error::transport(msg)),
            })
            .collect();
        let spaced = futures::stream::iter(items).then(|item| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            item
        });
        Ok(spaced.chain(futures::stream::pending()).boxed())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.stop_discovery_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Error::transport("not scanning"));
        }
        Ok(())
    }

    async fn connect(&self, id: &DeviceId) -> Result<FakeLink> {
        if id != self.link.id() {
            return Err(Error::DeviceNotFound(id.to_string()));
        }
        Ok(self.link.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedWrite {
    pub(crate) characteristic: Uuid,
    pub(crate) payload: Vec<u8>,
    pub(crate) started: Instant,
    pub(crate) acked: Instant,
}

#[derive(Debug)]
struct FakeLinkState {
    id: DeviceId,
    characteristics: Vec<Uuid>,
    mac_characteristic: Option<Vec<u8>>,
    hardware_address: Option<String>,
    ack_delay: Duration,
    fail_write: Option<Uuid>,
    writes: Mutex<Vec<RecordedWrite>>,
    notify: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    disconnects: AtomicUsize,
}

/// A link that records writes and lets the test push notifications
#[derive(Debug, Clone)]
pub(crate) struct FakeLink {
    state: Arc<FakeLinkState>,
}

pub(crate) struct FakeLinkBuilder {
    state: FakeLinkState,
}

impl FakeLinkBuilder {
    pub(crate) fn characteristics(mut self, characteristics: &[Uuid]) -> Self {
        self.state.characteristics = characteristics.to_vec();
        self
    }

    pub(crate) fn mac_characteristic(mut self, mac: &str) -> Self {
        self.state.mac_characteristic = Some(mac.as_bytes().to_vec());
        self
    }

    pub(crate) fn hardware_address(mut self, address: &str) -> Self {
        self.state.hardware_address = Some(address.to_string());
        self
    }

    pub(crate) fn ack_delay(mut self, delay: Duration) -> Self {
        self.state.ack_delay = delay;
        self
    }

    pub(crate) fn fail_write(mut self, characteristic: Uuid) -> Self {
        self.state.fail_write = Some(characteristic);
        self
    }

    pub(crate) fn build(self) -> FakeLink {
        FakeLink {
            state: Arc::new(self.state),
        }
    }
}

impl FakeLink {
    pub(crate) fn new(id: &str) -> Self {
        Self::builder(id).build()
    }

    pub(crate) fn builder(id: &str) -> FakeLinkBuilder {
        FakeLinkBuilder {
            state: FakeLinkState {
                id: DeviceId::from(id),
                characteristics: REQUIRED_CHARACTERISTICS.to_vec(),
                mac_characteristic: None,
                hardware_address: None,
                ack_delay: Duration::from_millis(20),
                fail_write: None,
                writes: Mutex::new(Vec::new()),
                notify: Mutex::new(None),
                disconnects: AtomicUsize::new(0),
            },
        }
    }

    pub(crate) fn writes(&self) -> Vec<RecordedWrite> {
        self.state.writes.lock().unwrap().clone()
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Push a STATUS notification as the frame would
    pub(crate) fn notify(&self, status: ProvisioningStatus) {
        self.notify_raw(StatusPayload::new(status).to_bytes());
    }

    pub(crate) fn notify_raw(&self, value: Vec<u8>) {
        if let Some(tx) = self.state.notify.lock().unwrap().as_ref() {
            let _ = tx.send(value);
        }
    }
}

impl Link for FakeLink {
    fn id(&self) -> &DeviceId {
        &self.state.id
    }

    fn characteristics(&self) -> Vec<Uuid> {
        self.state.characteristics.clone()
    }

    fn hardware_address(&self) -> Option<String> {
        self.state.hardware_address.clone()
    }

    async fn read(&self, characteristic: Uuid) -> Result<Option<Vec<u8>>> {
        if characteristic == crate::transport::MAC_ADDRESS {
            return Ok(self.state.mac_characteristic.clone());
        }
        Ok(None)
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        let started = Instant::now();
        tokio::time::sleep(self.state.ack_delay).await;
        if self.state.fail_write == Some(characteristic) {
            return Err(Error::transport("write not acknowledged"));
        }
        self.state.writes.lock().unwrap().push(RecordedWrite {
            characteristic,
            payload: payload.to_vec(),
            started,
            acked: Instant::now(),
        });
        Ok(())
    }

    async fn subscribe(&self, _characteristic: Uuid) -> Result<Notifications> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.notify.lock().unwrap() = Some(tx);
        Ok(futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|v| (v, rx)) }).boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        self.state.notify.lock().unwrap().take();
        Ok(())
    }
}
