//! Local storage of frame keys, keyed by MAC address
//!
//! The real store is the platform keychain through `keyring`. The memory store
//! backs the simulated mode and tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::key::{EncryptionKey, KeyParseError};

/// Keychain service name used for every entry
pub const KEYRING_SERVICE: &str = "novoframe";

const ENTRY_PREFIX: &str = "encryption_key_";

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("stored key for {mac_address} is corrupt: {source}")]
    Corrupt {
        mac_address: String,
        source: KeyParseError,
    },
}

pub trait KeyStore: Send + Sync {
    fn save_encryption_key(&self, mac_address: &str, key: &EncryptionKey) -> Result<(), KeyStoreError>;

    fn encryption_key(&self, mac_address: &str) -> Result<Option<EncryptionKey>, KeyStoreError>;

    /// Remove the key; removing a key that does not exist is not an error
    fn delete_encryption_key(&self, mac_address: &str) -> Result<(), KeyStoreError>;
}

fn entry_name(mac_address: &str) -> String {
    format!("{ENTRY_PREFIX}{mac_address}")
}

fn parse_stored(mac_address: &str, hex: &str) -> Result<EncryptionKey, KeyStoreError> {
    hex.parse().map_err(|source| KeyStoreError::Corrupt {
        mac_address: mac_address.to_string(),
        source,
    })
}

/// Platform keychain (macOS Keychain, Windows Credential Manager, Linux keyutils)
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, mac_address: &str) -> Result<keyring::Entry, KeyStoreError> {
        Ok(keyring::Entry::new(&self.service, &entry_name(mac_address))?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for KeyringStore {
    fn save_encryption_key(&self, mac_address: &str, key: &EncryptionKey) -> Result<(), KeyStoreError> {
        self.entry(mac_address)?.set_password(&key.to_hex())?;
        log::info!("saved encryption key for {mac_address}");
        Ok(())
    }

    fn encryption_key(&self, mac_address: &str) -> Result<Option<EncryptionKey>, KeyStoreError> {
        match self.entry(mac_address)?.get_password() {
            Ok(hex) => parse_stored(mac_address, &hex).map(Some),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_encryption_key(&self, mac_address: &str) -> Result<(), KeyStoreError> {
        match self.entry(mac_address)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for MemoryKeyStore {
    fn save_encryption_key(&self, mac_address: &str, key: &EncryptionKey) -> Result<(), KeyStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry_name(mac_address), key.to_hex());
        Ok(())
    }

    fn encryption_key(&self, mac_address: &str) -> Result<Option<EncryptionKey>, KeyStoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&entry_name(mac_address))
            .map(|hex| parse_stored(mac_address, hex))
            .transpose()
    }

    fn delete_encryption_key(&self, mac_address: &str) -> Result<(), KeyStoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&entry_name(mac_address));
        Ok(())
    }
}

impl<K: KeyStore + ?Sized> KeyStore for std::sync::Arc<K> {
    fn save_encryption_key(&self, mac_address: &str, key: &EncryptionKey) -> Result<(), KeyStoreError> {
        (**self).save_encryption_key(mac_address, key)
    }

    fn encryption_key(&self, mac_address: &str) -> Result<Option<EncryptionKey>, KeyStoreError> {
        (**self).encryption_key(mac_address)
    }

    fn delete_encryption_key(&self, mac_address: &str) -> Result<(), KeyStoreError> {
        (**self).delete_encryption_key(mac_address)
    }
}
