//! Host-side settings, stored as JSON under the Shakey home directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Get the Shakey home directory
///
/// Uses SHAKEY_HOME env var if set, otherwise ~/.shakey
pub fn shakey_home() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var("SHAKEY_HOME") {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".shakey"))
        .ok_or(ConfigError::NoHome)
}

fn default_device_name() -> String {
    shakey_proto::ble::DEVICE_NAME.to_string()
}

fn default_max_packet_size() -> usize {
    shakey_proto::ble::MAX_PACKET_SIZE
}

fn default_max_message_len() -> usize {
    shakey_proto::DEFAULT_MAX_MESSAGE_LEN
}

fn default_pacing_ms() -> u64 {
    50
}

fn default_scan_secs() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Takes precedence over `device_name` when set
    #[serde(default)]
    pub device_address: Option<String>,
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// Must match the device's reassembly limit
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_scan_secs")]
    pub scan_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            device_address: None,
            max_packet_size: default_max_packet_size(),
            max_message_len: default_max_message_len(),
            pacing_ms: default_pacing_ms(),
            scan_secs: default_scan_secs(),
        }
    }
}

impl HostConfig {
    /// Load from `<shakey_home>/config.json`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&shakey_home()?.join(CONFIG_FILE))
    }

    /// A missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Name or address used to pick the device out of a scan
    pub fn target(&self) -> &str {
        self.device_address.as_deref().unwrap_or(&self.device_name)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }
}
