//! Status notifications as an awaitable sequence

use std::time::Duration;

use futures::StreamExt;
use novoframe_proto::{ProvisioningStatus, StatusPayload};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::transport::Notifications;
use crate::{Error, Result};

/// Enough for several full runs of the status sequence
pub(crate) const STATUS_QUEUE_CAPACITY: usize = 32;

/// Queue of statuses reported by one frame.
///
/// Every monitor sees every status pushed after it was created. The queue
/// ends when the session disconnects.
#[derive(Debug)]
pub struct StatusMonitor {
    rx: broadcast::Receiver<ProvisioningStatus>,
}

impl StatusMonitor {
    pub(crate) fn new(rx: broadcast::Receiver<ProvisioningStatus>) -> Self {
        Self { rx }
    }

    pub(crate) fn resubscribe(&self) -> Self {
        Self {
            rx: self.rx.resubscribe(),
        }
    }

    /// Next status, or `None` once the session is gone
    pub async fn next(&mut self) -> Option<ProvisioningStatus> {
        loop {
            match self.rx.recv().await {
                Ok(status) => return Some(status),
                Err(RecvError::Lagged(n)) => log::warn!("status monitor fell behind, skipped {n} updates"),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the frame reports `target`.
    ///
    /// `on_update` sees every status before it is evaluated. `wifi_failed` and
    /// `error` fail the wait at once, whatever the target.
    pub async fn wait_for<F>(&mut self, target: ProvisioningStatus, timeout: Duration, mut on_update: F) -> Result<()>
    where
        F: FnMut(ProvisioningStatus),
    {
        log::debug!("waiting up to {timeout:?} for status {target}");
        let deadline = Instant::now() + timeout;
        loop {
            let status = match tokio::time::timeout_at(deadline, self.next()).await {
                Ok(Some(status)) => status,
                Ok(None) => return Err(Error::Disconnected),
                Err(_) => {
                    return Err(Error::Timeout {
                        status: target,
                        after: timeout,
                    });
                }
            };

            on_update(status);

            if status == target {
                return Ok(());
            }
            if status.is_failure() {
                return Err(Error::DeviceFailed(status));
            }
        }
    }
}

/// Decode raw STATUS notifications onto the session queue until the link
/// drops or nobody listens any more
pub(crate) async fn forward_statuses(mut notifications: Notifications, tx: broadcast::Sender<ProvisioningStatus>) {
    while let Some(value) = notifications.next().await {
        match StatusPayload::from_bytes(&value) {
            Ok(payload) => {
                log::debug!("status update: {}", payload.status);
                if tx.send(payload.status).is_err() {
                    break;
                }
            }
            Err(e) => log::warn!("ignoring status notification: {e}"),
        }
    }
    log::debug!("status notifications ended");
}
