//! Per-frame symmetric key, generated on the phone or host during setup

use std::fmt;
use std::str::FromStr;

use rand::RngCore;

pub const KEY_LEN: usize = 32;

/// 256-bit key shared between the host and one frame.
///
/// Travels to the frame as 64 lowercase hex characters and is stored locally
/// under the frame's MAC address. `Debug` only shows a short prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

#[derive(Debug, thiserror::Error)]
pub enum KeyParseError {
    #[error("encryption key must be {expected} hex characters, got {0}", expected = KEY_LEN * 2)]
    Length(usize),
    #[error("encryption key is not valid hex: {0}")]
    Hex(#[from] data_encoding::DecodeError),
}

impl EncryptionKey {
    /// Fresh key from the operating system RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        data_encoding::HEXLOWER.encode(&self.0)
    }

    /// First 16 hex characters, for logs
    pub fn fingerprint(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(16);
        hex.push_str("...");
        hex
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey({})", self.fingerprint())
    }
}

impl FromStr for EncryptionKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != KEY_LEN * 2 {
            return Err(KeyParseError::Length(s.len()));
        }
        let bytes = data_encoding::HEXLOWER_PERMISSIVE.decode(s.as_bytes())?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| KeyParseError::Length(v.len() * 2))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_64_lowercase_chars() {
        let hex = EncryptionKey::generate().to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn keys_are_not_repeated() {
        assert_ne!(EncryptionKey::generate(), EncryptionKey::generate());
    }

    #[test]
    fn parses_hex() {
        let key = EncryptionKey::from_bytes([0xab; KEY_LEN]);
        let parsed: EncryptionKey = key.to_hex().parse().unwrap();
        assert_eq!(parsed, key);
        let upper: EncryptionKey = key.to_hex().to_uppercase().parse().unwrap();
        assert_eq!(upper, key);
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!("abcd".parse::<EncryptionKey>(), Err(KeyParseError::Length(4))));
        let not_hex = "zz".repeat(KEY_LEN);
        assert!(matches!(not_hex.parse::<EncryptionKey>(), Err(KeyParseError::Hex(_))));
    }

    #[test]
    fn debug_hides_key() {
        let key = EncryptionKey::from_bytes([0x11; KEY_LEN]);
        let debug = format!("{key:?}");
        assert_eq!(debug, "EncryptionKey(1111111111111111...)");
        assert!(!debug.contains(&key.to_hex()));
    }
}
