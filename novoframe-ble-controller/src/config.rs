//! Tool configuration, stored as `config.json` in the NovoFrame home

use std::path::{Path, PathBuf};
use std::time::Duration;

use novoframe_proto::ble;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.json";
const HOME_DIR: &str = ".novoframe";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("no home directory found, set NOVOFRAME_HOME")]
    NoHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub scan_timeout_ms: u64,
    pub wifi_timeout_ms: u64,
    pub write_pacing_ms: u64,
    pub simulated_step_ms: u64,
    pub setup_name: String,
    pub api_base_url: String,
    pub api_token: Option<String>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: ble::timing::SCAN_TIMEOUT_MS,
            wifi_timeout_ms: ble::timing::WIFI_CONNECT_TIMEOUT_MS,
            write_pacing_ms: ble::timing::WRITE_PACING_MS,
            simulated_step_ms: ble::timing::SIMULATED_STATUS_STEP_MS,
            setup_name: ble::SETUP_NAME.to_string(),
            api_base_url: "http://localhost:3000".to_string(),
            api_token: None,
        }
    }
}

impl SetupConfig {
    /// Read `config.json` from `home`. A missing file gives the defaults.
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn wifi_timeout(&self) -> Duration {
        Duration::from_millis(self.wifi_timeout_ms)
    }

    pub fn write_pacing(&self) -> Duration {
        Duration::from_millis(self.write_pacing_ms)
    }

    pub fn simulated_step(&self) -> Duration {
        Duration::from_millis(self.simulated_step_ms)
    }
}

/// `$NOVOFRAME_HOME`, or `~/.novoframe`
pub fn novoframe_home() -> Result<PathBuf, ConfigError> {
    home_from(std::env::var_os("NOVOFRAME_HOME").map(PathBuf::from))
}

fn home_from(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(home) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(home);
    }
    Ok(dirs::home_dir().ok_or(ConfigError::NoHome)?.join(HOME_DIR))
}
