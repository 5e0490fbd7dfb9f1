//! Discovery of frames waiting to be provisioned

use std::collections::HashSet;
use std::sync::PoisonError;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::StreamExt;
use novoframe_proto::ble::UNKNOWN_RSSI;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::Result;
use crate::provisioner::Provisioner;
use crate::transport::{Advertisement, Central, DeviceId, SERVICE};

/// A frame found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: String,
    /// dBm
    pub rssi: i16,
}

impl DiscoveredDevice {
    /// Signal strength on a one to three scale
    pub fn signal_bars(&self) -> u8 {
        match self.rssi {
            r if r > -60 => 3,
            r if r > -80 => 2,
            _ => 1,
        }
    }
}

impl<C: Central> Provisioner<C> {
    /// Scan for frames in setup mode.
    ///
    /// `on_found` runs as soon as a new frame is seen and at most once per
    /// identity. Completes after `timeout`, or earlier when [`stop_scan`] is
    /// called. A transport error ends the scan and is returned.
    ///
    /// [`stop_scan`]: Provisioner::stop_scan
    pub async fn scan<F>(&self, mut on_found: F, timeout: Duration) -> Result<()>
    where
        F: FnMut(DiscoveredDevice),
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let generation = self.scan_generation.fetch_add(1, Ordering::Relaxed) + 1;
        // A previous scan still registered here is stopped by dropping its sender
        let previous = self
            .scan_stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((generation, stop_tx));
        drop(previous);

        log::info!("scanning for {:?} frames for {timeout:?}", self.setup_name);
        let mut discovery = match self.central.start_discovery(SERVICE).await {
            Ok(discovery) => discovery,
            Err(e) => {
                self.finish_scan(generation).await;
                return Err(e);
            }
        };

        let deadline = Instant::now() + timeout;
        let mut seen = HashSet::new();
        let mut exhausted = false;
        let outcome = loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break Ok(()),
                _ = &mut stop_rx => {
                    log::debug!("scan stopped");
                    break Ok(());
                }
                event = discovery.next(), if !exhausted => match event {
                    Some(Ok(advertisement)) => {
                        let Some(device) = self.eligible(advertisement) else { continue };
                        if seen.insert(device.id.clone()) {
                            log::info!("found {} ({}) RSSI: {} dBm", device.name, device.id, device.rssi);
                            on_found(device);
                        }
                    }
                    Some(Err(e)) => {
                        log::error!("scan failed: {e}");
                        break Err(e);
                    }
                    None => exhausted = true,
                },
            }
        };

        drop(discovery);
        self.finish_scan(generation).await;
        log::debug!("scan complete, {} frames", seen.len());
        outcome
    }

    /// Stop the scan in flight. Safe to call at any time, any number of times.
    pub async fn stop_scan(&self) {
        if let Some((_, stop)) = self.take_scan_slot() {
            let _ = stop.send(());
        }
        self.stop_discovery().await;
    }

    /// Release the radio, unless a newer scan has taken it over
    async fn finish_scan(&self, generation: u64) {
        let owned = {
            let mut slot = self.scan_stop.lock().unwrap_or_else(PoisonError::into_inner);
            let owned = matches!(*slot, Some((g, _)) if g == generation);
            if owned {
                slot.take();
            }
            owned
        };
        if owned {
            self.stop_discovery().await;
        } else {
            log::debug!("scan {generation} no longer owns discovery");
        }
    }

    async fn stop_discovery(&self) {
        if let Err(e) = self.central.stop_discovery().await {
            log::warn!("failed to stop discovery: {e}");
        }
    }

    fn eligible(&self, advertisement: Advertisement) -> Option<DiscoveredDevice> {
        let name = advertisement.local_name?;
        // An empty service list passes: discovery already filters by service
        let services = &advertisement.services;
        if name != self.setup_name || (!services.is_empty() && !services.contains(&SERVICE)) {
            return None;
        }
        Some(DiscoveredDevice {
            id: advertisement.id,
            name,
            rssi: advertisement.rssi.unwrap_or(UNKNOWN_RSSI),
        })
    }
}
