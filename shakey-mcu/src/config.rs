//! Peripheral configuration

use std::time::Duration;

use crate::ble::{Advertisement, DEVICE_NAME};

// Customize the device behavior here
const SHAKE_THRESHOLD: f32 = 20.0;
const DEFAULT_STRING: &str = "Hello World";

/// Tunables for the peripheral controller
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Advertised complete local name
    pub device_name: String,
    /// Per-axis acceleration (m/s^2) that counts as a shake
    pub shake_threshold: f32,
    /// Binding typed on shake until the host sends another
    pub default_string: String,
    /// Cap on a partially received message
    pub max_message_len: usize,
    /// How long one connection wait may block
    pub connect_poll: Duration,
    /// Sleep after typing the binding
    pub emit_cooldown: Duration,
    /// Delay between keys
    pub key_delay: Duration,
    /// Pause after a disconnect before advertising again
    pub reconnect_pause: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            shake_threshold: SHAKE_THRESHOLD,
            default_string: DEFAULT_STRING.to_string(),
            max_message_len: shakey_proto::DEFAULT_MAX_MESSAGE_LEN,
            connect_poll: Duration::from_millis(100),
            emit_cooldown: Duration::from_secs(1),
            key_delay: Duration::from_millis(100),
            reconnect_pause: Duration::from_secs(1),
        }
    }
}

impl DeviceConfig {
    pub fn advertisement(&self) -> Advertisement {
        Advertisement::new(&self.device_name)
    }
}
