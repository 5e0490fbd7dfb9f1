//! Credential delivery

use crate::key::EncryptionKey;
use crate::provisioner::Provisioner;
use crate::session::Session;
use crate::transport::{Central, ENCRYPTION_KEY, Link, PASSWORD, SSID};
use crate::Result;

impl<C: Central> Provisioner<C> {
    /// Write WiFi credentials and the encryption key to the frame.
    ///
    /// Writes go out in order SSID, password, key, each acknowledged before
    /// the pacing gap starts. Resolves once the key write is acknowledged;
    /// the outcome of the WiFi join arrives later as status updates. The
    /// first failed write aborts the rest.
    pub async fn configure(
        &self,
        session: &Session<C::Link>,
        ssid: &str,
        password: &str,
        key: &EncryptionKey,
    ) -> Result<()> {
        let link = session.link();
        log::info!("configuring {} for network {ssid:?}", link.id());

        link.write(SSID, ssid.as_bytes()).await?;
        log::debug!("SSID written");
        tokio::time::sleep(self.write_pacing).await;

        link.write(PASSWORD, password.as_bytes()).await?;
        log::debug!("password written ({})", mask(password));
        tokio::time::sleep(self.write_pacing).await;

        link.write(ENCRYPTION_KEY, key.to_hex().as_bytes()).await?;
        log::debug!("encryption key written ({})", key.fingerprint());
        Ok(())
    }
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
