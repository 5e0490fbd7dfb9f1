//! Simulated frames, for hosts without Bluetooth and for demos
//!
//! Each connected simulated frame runs a small firmware task that answers
//! subscriptions and writes with STATUS notifications, one every
//! `status_step`, in the same order a real frame reports them. Nothing here
//! touches a radio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use novoframe_proto::{ProvisioningStatus, StatusPayload, ble};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::key::EncryptionKey;
use crate::transport::{
    Advertisement, Central, DeviceId, Discovery, ENCRYPTION_KEY, Link, MAC_ADDRESS, Notifications,
    PASSWORD, SERVICE, SSID, STATUS,
};
use crate::{Error, Result};

/// One frame in setup mode
#[derive(Debug, Clone)]
pub struct SimulatedFrame {
    pub id: DeviceId,
    pub name: String,
    pub rssi: i16,
    pub mac_address: String,
    /// The frame reports `wifi_failed` when asked to join this SSID
    pub failing_ssid: Option<String>,
}

impl SimulatedFrame {
    /// A healthy frame with a MAC address derived from `id`
    pub fn new(id: &str, rssi: i16) -> Self {
        let suffix = id.bytes().fold(0u8, |acc, b| acc.wrapping_mul(31).wrapping_add(b));
        Self {
            id: DeviceId::from(id),
            name: ble::SETUP_NAME.to_string(),
            rssi,
            mac_address: format!("AA:BB:CC:DD:EE:{suffix:02X}"),
            failing_ssid: None,
        }
    }

    pub fn with_mac_address(mut self, mac_address: &str) -> Self {
        self.mac_address = mac_address.to_string();
        self
    }

    pub fn failing_wifi_for(mut self, ssid: &str) -> Self {
        self.failing_ssid = Some(ssid.to_string());
        self
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            id: self.id.clone(),
            local_name: Some(self.name.clone()),
            rssi: Some(self.rssi),
            services: vec![SERVICE],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulatedTiming {
    /// Gap between advertising rounds; every frame is re-advertised each round
    pub advertising_interval: Duration,
    pub connect_delay: Duration,
    pub status_step: Duration,
}

impl Default for SimulatedTiming {
    fn default() -> Self {
        Self {
            advertising_interval: Duration::from_secs(2),
            connect_delay: Duration::from_secs(1),
            status_step: Duration::from_millis(ble::timing::SIMULATED_STATUS_STEP_MS),
        }
    }
}

/// A fleet of simulated frames behind a pretend adapter
#[derive(Debug, Clone)]
pub struct SimulatedCentral {
    frames: Arc<Vec<SimulatedFrame>>,
    timing: SimulatedTiming,
    powered_on: bool,
}

impl SimulatedCentral {
    pub fn new(frames: Vec<SimulatedFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
            timing: SimulatedTiming::default(),
            powered_on: true,
        }
    }

    pub fn with_timing(mut self, timing: SimulatedTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn powered_off(mut self) -> Self {
        self.powered_on = false;
        self
    }

    pub fn frames(&self) -> &[SimulatedFrame] {
        &self.frames
    }
}

impl Default for SimulatedCentral {
    fn default() -> Self {
        Self::new(vec![
            SimulatedFrame::new("mock-device-1", -50),
            SimulatedFrame::new("mock-device-2", -70),
        ])
    }
}

impl Central for SimulatedCentral {
    type Link = SimulatedLink;

    async fn is_powered_on(&self) -> Result<bool> {
        Ok(self.powered_on)
    }

    async fn start_discovery(&self, service: Uuid) -> Result<Discovery> {
        if !self.powered_on {
            return Err(Error::transport("Bluetooth is powered off"));
        }
        let frames: Vec<Advertisement> = self
            .frames
            .iter()
            .map(SimulatedFrame::advertisement)
            .filter(|a| a.services.contains(&service))
            .collect();
        if frames.is_empty() {
            return Ok(futures::stream::pending().boxed());
        }

        let interval = self.timing.advertising_interval;
        let discovery = futures::stream::unfold(0usize, move |n| {
            let advertisement = frames[n % frames.len()].clone();
            let round_start = n % frames.len() == 0;
            async move {
                if round_start {
                    tokio::time::sleep(interval).await;
                }
                Some((Ok(advertisement), n + 1))
            }
        });
        Ok(discovery.boxed())
    }

    async fn stop_discovery(&self) -> Result<()> {
        Ok(())
    }

    async fn connect(&self, id: &DeviceId) -> Result<SimulatedLink> {
        let frame = self
            .frames
            .iter()
            .find(|f| &f.id == id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound(id.to_string()))?;
        tokio::time::sleep(self.timing.connect_delay).await;
        log::info!("[simulated] connected to {}", frame.id);
        Ok(SimulatedLink::start(frame, self.timing.status_step))
    }
}

#[derive(Debug)]
enum FirmwareEvent {
    Subscribed,
    Ssid(String),
    Password(String),
    Key(String),
}

type NotifySlot = Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>;

#[derive(Debug)]
struct LinkState {
    frame: SimulatedFrame,
    events: mpsc::UnboundedSender<FirmwareEvent>,
    notify: NotifySlot,
    firmware: JoinHandle<()>,
    connected: AtomicBool,
}

impl Drop for LinkState {
    fn drop(&mut self) {
        self.firmware.abort();
    }
}

/// Connection to a simulated frame
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    state: Arc<LinkState>,
}

impl SimulatedLink {
    fn start(frame: SimulatedFrame, step: Duration) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let notify: NotifySlot = Arc::default();
        let firmware = tokio::spawn(run_firmware(frame.clone(), rx, notify.clone(), step));
        Self {
            state: Arc::new(LinkState {
                frame,
                events,
                notify,
                firmware,
                connected: AtomicBool::new(true),
            }),
        }
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

impl Link for SimulatedLink {
    fn id(&self) -> &DeviceId {
        &self.state.frame.id
    }

    fn characteristics(&self) -> Vec<Uuid> {
        vec![SSID, PASSWORD, ENCRYPTION_KEY, STATUS, MAC_ADDRESS]
    }

    fn hardware_address(&self) -> Option<String> {
        None
    }

    async fn read(&self, characteristic: Uuid) -> Result<Option<Vec<u8>>> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        Ok((characteristic == MAC_ADDRESS).then(|| self.state.frame.mac_address.clone().into_bytes()))
    }

    async fn write(&self, characteristic: Uuid, payload: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        let text = String::from_utf8_lossy(payload).into_owned();
        let event = match characteristic {
            c if c == SSID => FirmwareEvent::Ssid(text),
            c if c == PASSWORD => FirmwareEvent::Password(text),
            c if c == ENCRYPTION_KEY => FirmwareEvent::Key(text),
            other => return Err(Error::CharacteristicNotFound(other)),
        };
        self.state.events.send(event).map_err(|_| Error::Disconnected)
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<Notifications> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        if characteristic != STATUS {
            return Err(Error::CharacteristicNotFound(characteristic));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.notify.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.state
            .events
            .send(FirmwareEvent::Subscribed)
            .map_err(|_| Error::Disconnected)?;
        let notifications =
            futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|v| (v, rx)) });
        Ok(notifications.boxed())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.state.connected.swap(false, Ordering::AcqRel) {
            log::info!("[simulated] disconnected from {}", self.state.frame.id);
        }
        self.state.firmware.abort();
        self.state.notify.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Received {
    ssid: Option<String>,
    password: Option<String>,
}

fn respond(frame: &SimulatedFrame, received: &mut Received, event: FirmwareEvent) -> Vec<ProvisioningStatus> {
    use ProvisioningStatus as S;

    match event {
        FirmwareEvent::Subscribed => vec![S::Connecting],
        FirmwareEvent::Ssid(ssid) => {
            received.ssid = Some(ssid);
            vec![S::SsidReceived]
        }
        FirmwareEvent::Password(password) => {
            received.password = Some(password);
            vec![S::PasswordReceived]
        }
        FirmwareEvent::Key(key) => {
            let (Some(ssid), Some(_)) = (&received.ssid, &received.password) else {
                return vec![S::Error];
            };
            if key.parse::<EncryptionKey>().is_err() {
                return vec![S::Error];
            }
            let joined = !ssid.is_empty() && frame.failing_ssid.as_deref() != Some(ssid.as_str());
            let outcome = if joined { S::WifiConnected } else { S::WifiFailed };
            vec![S::KeyReceived, S::CredentialsSaved, S::ConnectingWifi, outcome]
        }
    }
}

async fn run_firmware(
    frame: SimulatedFrame,
    mut events: mpsc::UnboundedReceiver<FirmwareEvent>,
    notify: NotifySlot,
    step: Duration,
) {
    let mut received = Received::default();
    while let Some(event) = events.recv().await {
        log::debug!("[simulated] {} got {event:?}", frame.id);
        for status in respond(&frame, &mut received, event) {
            tokio::time::sleep(step).await;
            log::info!("[simulated] {} status: {status}", frame.id);
            let tx = notify.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(tx) = tx {
                let _ = tx.send(StatusPayload::new(status).to_bytes());
            }
        }
    }
}
