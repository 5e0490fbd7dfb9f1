//! A live connection to one frame in setup mode

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::provisioner::Provisioner;
use crate::status::{STATUS_QUEUE_CAPACITY, StatusMonitor, forward_statuses};
use crate::transport::{Central, DeviceId, Link, MAC_ADDRESS, REQUIRED_CHARACTERISTICS, STATUS};
use crate::{Error, Result};

/// Connected frame with its status queue attached.
///
/// Dropping a session without [`Provisioner::disconnect`] still releases the
/// link, in the background.
#[derive(Debug)]
pub struct Session<L: Link> {
    link: L,
    queue: StatusMonitor,
    forwarder: Option<JoinHandle<()>>,
    released: bool,
}

impl<L: Link> Session<L> {
    pub fn id(&self) -> &DeviceId {
        self.link.id()
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// The queue `wait_for_status` consumes
    pub(crate) fn statuses(&mut self) -> &mut StatusMonitor {
        &mut self.queue
    }

    pub(crate) fn subscribe(&self) -> StatusMonitor {
        self.queue.resubscribe()
    }

    async fn release(mut self) -> Result<()> {
        self.released = true;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.link.disconnect().await
    }
}

impl<L: Link> Drop for Session<L> {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("session {} dropped outside a runtime, link left open", self.link.id());
            return;
        };
        let link = self.link.clone();
        handle.spawn(async move {
            if let Err(e) = link.disconnect().await {
                log::warn!("background disconnect of {} failed: {e}", link.id());
            }
        });
    }
}

impl<C: Central> Provisioner<C> {
    /// Connect to a discovered frame and start listening for its status.
    ///
    /// Fails with `CharacteristicNotFound` when the frame lacks one of the
    /// provisioning characteristics; the link is dropped in that case.
    pub async fn connect(&self, id: &DeviceId) -> Result<Session<C::Link>> {
        log::info!("connecting to {id}");
        let link = self.central.connect(id).await?;
        match attach(link.clone()).await {
            Ok(session) => {
                log::info!("connected to {id}");
                Ok(session)
            }
            Err(e) => {
                log::error!("connection to {id} unusable: {e}");
                if let Err(e) = link.disconnect().await {
                    log::warn!("disconnect after failed connect: {e}");
                }
                Err(e)
            }
        }
    }

    /// MAC of the connected frame.
    ///
    /// Prefers the frame's own MAC characteristic, then the platform's
    /// hardware address, then the platform identity.
    pub async fn mac_address(&self, session: &Session<C::Link>) -> String {
        let link = session.link();
        if link.characteristics().contains(&MAC_ADDRESS) {
            match link.read(MAC_ADDRESS).await {
                Ok(Some(raw)) => {
                    let mac = String::from_utf8_lossy(&raw).trim_matches(char::from(0)).trim().to_string();
                    if !mac.is_empty() {
                        return mac;
                    }
                }
                Ok(None) => {}
                Err(e) => log::warn!("reading MAC characteristic failed: {e}"),
            }
        }
        link.hardware_address().unwrap_or_else(|| link.id().to_string())
    }

    /// Disconnect and end the session's status queue. Never fails.
    pub async fn disconnect(&self, session: Session<C::Link>) {
        let id = session.id().clone();
        match session.release().await {
            Ok(()) => log::info!("disconnected from {id}"),
            Err(e) => log::warn!("disconnect from {id} failed: {e}"),
        }
    }
}

async fn attach<L: Link>(link: L) -> Result<Session<L>> {
    let available = link.characteristics();
    if let Some(missing) = REQUIRED_CHARACTERISTICS.into_iter().find(|c| !available.contains(c)) {
        return Err(Error::CharacteristicNotFound(missing));
    }
    let notifications = link.subscribe(STATUS).await?;
    let (tx, rx) = broadcast::channel(STATUS_QUEUE_CAPACITY);
    let queue = StatusMonitor::new(rx);
    let forwarder = tokio::spawn(forward_statuses(notifications, tx));
    Ok(Session {
        link,
        queue,
        forwarder: Some(forwarder),
        released: false,
    })
}
