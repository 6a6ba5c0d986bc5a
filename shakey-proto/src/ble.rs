//! BLE GATT Service Protocol Constants for Shakey
//!
//! The peripheral exposes a HID keyboard service and a Nordic UART service.
//! Binding updates travel host -> device over the UART RX characteristic.

/// HID over GATT service UUID (0x1812)
pub const HID_SERVICE_UUID: &str = "00001812-0000-1000-8000-00805f9b34fb";

/// Nordic UART Service UUID
pub const UART_SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// UART RX Characteristic UUID (host writes fragments here)
pub const UART_RX_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// UART TX Characteristic UUID (device -> host notify)
pub const UART_TX_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Largest payload accepted per UART write
pub const MAX_PACKET_SIZE: usize = 20;

/// Default advertised device name
pub const DEVICE_NAME: &str = "XIAO";

/// Services listed in the advertisement, in advertising order
pub const ADVERTISED_SERVICES: [&str; 2] = [HID_SERVICE_UUID, UART_SERVICE_UUID];
