//! NovoFrame BLE Controller
//!
//! Client side of NovoFrame provisioning: find a frame in setup mode, hand it
//! WiFi credentials and a fresh encryption key over BLE, follow its status
//! notifications until it is online, then keep the key and pair the frame.
//!
//! # Example
//!
//! ```ignore
//! use novoframe_ble_controller::{
//!     KeyringStore, Provisioner, SetupFlow, SimulatedCentral, WifiCredentials, select_central,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let central = select_central(false, SimulatedCentral::default()).await;
//!     let mut flow = SetupFlow::new(Provisioner::new(central), KeyringStore::new());
//!
//!     // Scan for frames
//!     let frames = flow.scan(|f| println!("{} ({} dBm)", f.id, f.rssi)).await?;
//!
//!     // Provision the first one
//!     let credentials = WifiCredentials::new("MySSID", "MyPassword")?;
//!     let frame = flow.provision(&frames[0].id, &credentials, |s| println!("{}", s.message())).await?;
//!     println!("frame {} is online", frame.mac_address);
//!
//!     flow.teardown().await;
//!     Ok(())
//! }
//! ```

mod api;
mod backend;
#[cfg(feature = "ble")]
mod btle;
mod config;
mod configure;
mod error;
mod flow;
mod key;
mod keystore;
mod provisioner;
mod scanner;
mod session;
mod simulated;
mod status;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{Frame, FrameApi, HttpFrameApi, PairError};
pub use backend::{AnyCentral, AnyLink, select_central};
#[cfg(feature = "ble")]
pub use btle::{BleCentral, BleLink};
pub use config::{CONFIG_FILE, ConfigError, SetupConfig, novoframe_home};
pub use error::{Error, Result};
pub use flow::{ProvisionedFrame, Remedy, SetupError, SetupFlow, WifiCredentials};
pub use key::{EncryptionKey, KEY_LEN, KeyParseError};
pub use keystore::{KEYRING_SERVICE, KeyStore, KeyStoreError, KeyringStore, MemoryKeyStore};
pub use novoframe_proto::ProvisioningStatus;
pub use provisioner::Provisioner;
pub use scanner::DiscoveredDevice;
pub use session::Session;
pub use simulated::{SimulatedCentral, SimulatedFrame, SimulatedLink, SimulatedTiming};
pub use status::StatusMonitor;
pub use transport::{Central, DeviceId, Link};
