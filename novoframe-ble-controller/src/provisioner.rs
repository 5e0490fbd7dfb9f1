//! The provisioning contract, written once over any [`Central`]
//!
//! Scanning lives in `scanner`, connecting in `session`, credential writes in
//! `configure`; this file holds the shared state and the small operations.

use std::sync::atomic::AtomicU64;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use novoframe_proto::{ProvisioningStatus, ble};
use tokio::sync::oneshot;

use crate::Result;
use crate::session::Session;
use crate::status::StatusMonitor;
use crate::transport::Central;

/// Stop signal for the scan in flight, tagged with the scan it belongs to
pub(crate) type ScanSlot = Mutex<Option<(u64, oneshot::Sender<()>)>>;

pub struct Provisioner<C: Central> {
    pub(crate) central: C,
    pub(crate) setup_name: String,
    pub(crate) write_pacing: Duration,
    pub(crate) scan_stop: ScanSlot,
    pub(crate) scan_generation: AtomicU64,
}

impl<C: Central> Provisioner<C> {
    /// Provisioner with the default setup name and write pacing
    pub fn new(central: C) -> Self {
        Self {
            central,
            setup_name: ble::SETUP_NAME.to_string(),
            write_pacing: Duration::from_millis(ble::timing::WRITE_PACING_MS),
            scan_stop: Mutex::new(None),
            scan_generation: AtomicU64::new(0),
        }
    }

    /// Only report frames advertising this local name
    pub fn with_setup_name(mut self, name: impl Into<String>) -> Self {
        self.setup_name = name.into();
        self
    }

    /// Gap between consecutive credential writes
    pub fn with_write_pacing(mut self, pacing: Duration) -> Self {
        self.write_pacing = pacing;
        self
    }

    /// The BLE stack this provisioner drives
    pub fn central(&self) -> &C {
        &self.central
    }

    /// Whether Bluetooth is on
    pub async fn is_enabled(&self) -> Result<bool> {
        self.central.is_powered_on().await
    }

    /// An extra view of the session's statuses, starting from now
    pub fn monitor_status(&self, session: &Session<C::Link>) -> StatusMonitor {
        session.subscribe()
    }

    /// Wait for `target` on the session queue; see [`StatusMonitor::wait_for`]
    pub async fn wait_for_status(
        &self,
        session: &mut Session<C::Link>,
        target: ProvisioningStatus,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_for_status_with(session, target, timeout, |_| {}).await
    }

    pub async fn wait_for_status_with<F>(
        &self,
        session: &mut Session<C::Link>,
        target: ProvisioningStatus,
        timeout: Duration,
        on_update: F,
    ) -> Result<()>
    where
        F: FnMut(ProvisioningStatus),
    {
        session.statuses().wait_for(target, timeout, on_update).await
    }

    /// Stop any scan and release the central. Never fails.
    pub async fn teardown(&self) {
        self.stop_scan().await;
        self.central.shutdown().await;
    }

    pub(crate) fn take_scan_slot(&self) -> Option<(u64, oneshot::Sender<()>)> {
        self.scan_stop.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
