//! BLE scanning and service discovery for Shakey devices
//!
//! Provides functions to find a Shakey peripheral and list what it offers.

use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use uuid::Uuid;

use crate::link::{LinkError, disconnect_on_error};

/// A discovered BLE device
#[derive(Debug, Clone)]
pub struct ShakeyDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_target: bool,
}

/// A GATT service and its characteristics
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicInfo>,
}

#[derive(Debug, Clone)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharPropFlags,
}

/// Parse a UUID constant from shakey_proto
pub fn parse_uuid(s: &str) -> Result<Uuid, LinkError> {
    Uuid::parse_str(s).map_err(|e| LinkError::InvalidUuid(format!("{s}: {e}")))
}

/// Match a device by exact name or by address (case-insensitive)
pub fn matches_target(name: &str, address: &str, target: &str) -> bool {
    name == target || address.eq_ignore_ascii_case(target)
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, LinkError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(LinkError::NoAdapter)
}

/// Scan for BLE devices
///
/// Devices matching `target` (name or address) have `is_target = true`.
pub async fn scan(target: &str, duration: Duration) -> Result<Vec<ShakeyDevice>, LinkError> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let address = peripheral.address().to_string();
            let is_target = matches_target(&name, &address, target);

            devices.push(ShakeyDevice {
                name,
                address,
                rssi: props.rssi,
                is_target,
            });
        }
    }

    adapter.stop_scan().await?;
    Ok(devices)
}

/// Find a device by name or address
pub async fn find_device(
    adapter: &Adapter,
    target: &str,
    duration: Duration,
) -> Result<Peripheral, LinkError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let address = peripheral.address().to_string();

            if matches_target(&name, &address, target) {
                adapter.stop_scan().await?;
                log::debug!("Found device: {} ({})", name, address);
                return Ok(peripheral);
            }
        }
    }

    adapter.stop_scan().await?;
    Err(LinkError::DeviceNotFound(target.to_string()))
}

/// Services and characteristics of a connected peripheral
pub fn services_of(peripheral: &Peripheral) -> Vec<ServiceInfo> {
    peripheral
        .services()
        .into_iter()
        .map(|service| ServiceInfo {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .into_iter()
                .map(|c| CharacteristicInfo {
                    uuid: c.uuid,
                    properties: c.properties,
                })
                .collect(),
        })
        .collect()
}

/// Connect to a device and list its services (read-only)
pub async fn discover(
    target: &str,
    duration: Duration,
) -> Result<(ShakeyDevice, Vec<ServiceInfo>), LinkError> {
    let adapter = get_adapter().await?;
    let device = find_device(&adapter, target, duration).await?;

    device.connect().await?;
    let discovered = device.discover_services().await.map_err(LinkError::from);
    disconnect_on_error(discovered, device.disconnect()).await?;

    let props = device.properties().await?.unwrap_or_default();
    let info = ShakeyDevice {
        name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
        address: device.address().to_string(),
        rssi: props.rssi,
        is_target: true,
    };
    let services = services_of(&device);

    let _ = device.disconnect().await;
    Ok((info, services))
}
