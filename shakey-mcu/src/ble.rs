//! BLE GATT server abstraction for the Shakey peripheral
//!
//! Protocol constants (UUIDs, packet size) are in shakey_proto::ble.
//! This module provides MCU-specific types and traits.

use std::time::Duration;

// Re-export protocol constants for convenience
pub use shakey_proto::ble::{
    ADVERTISED_SERVICES, DEVICE_NAME, HID_SERVICE_UUID, MAX_PACKET_SIZE, UART_RX_UUID,
    UART_SERVICE_UUID, UART_TX_UUID,
};

/// Advertisement payload: complete local name plus offered services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub name: String,
    pub services: Vec<&'static str>,
}

impl Advertisement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: ADVERTISED_SERVICES.to_vec(),
        }
    }
}

/// Trait for BLE GATT server implementations
///
/// MCU-specific crates implement this trait using their BLE stack. The
/// server is expected to host the HID and UART services listed in the
/// advertisement.
pub trait BleServer {
    /// Error type for BLE operations
    type Error: std::fmt::Display;

    /// Start BLE advertising
    fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<(), Self::Error>;

    /// Stop BLE advertising
    fn stop_advertising(&mut self) -> Result<(), Self::Error>;

    /// Wait up to `timeout` for a central to connect
    ///
    /// Returns `Ok(true)` as soon as a connection is up.
    fn wait_for_connection(&mut self, timeout: Duration) -> Result<bool, Self::Error>;

    /// Check whether a central is currently connected
    fn is_connected(&self) -> bool;

    /// Take whatever bytes are queued on the UART RX characteristic (non-blocking)
    fn read_uart(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;
}
