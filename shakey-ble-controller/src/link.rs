//! Write path to the device's UART RX characteristic

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use shakey_proto::ble::UART_RX_UUID;
use std::future::Future;
use std::time::Duration;

use crate::ble::{find_device, get_adapter, parse_uuid};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("device '{0}' not found")]
    DeviceNotFound(String),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(&'static str),
    #[error("not connected")]
    NotConnected,
    #[error("invalid UUID {0}")]
    InvalidUuid(String),
    #[error(transparent)]
    Ble(#[from] btleplug::Error),
}

/// A connection that accepts raw UART writes.
///
/// Implemented over btleplug by [`BtleLink`]; tests substitute in-memory links.
pub trait UartLink {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn connect(&mut self) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Write one fragment to the RX characteristic
    fn write(&mut self, chunk: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;
}

/// UART link to a real device, resolved by name or address on connect
pub struct BtleLink {
    target: String,
    scan_duration: Duration,
    peripheral: Option<Peripheral>,
    rx: Option<Characteristic>,
}

impl BtleLink {
    pub fn new(target: impl Into<String>, scan_duration: Duration) -> Self {
        Self {
            target: target.into(),
            scan_duration,
            peripheral: None,
            rx: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

async fn locate_rx(peripheral: &Peripheral) -> Result<Characteristic, LinkError> {
    peripheral.discover_services().await?;

    for service in peripheral.services() {
        log::debug!("Service: {}", service.uuid);
        for c in &service.characteristics {
            log::debug!("  Characteristic: {} {:?}", c.uuid, c.properties);
        }
    }

    let rx_uuid = parse_uuid(UART_RX_UUID)?;
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == rx_uuid)
        .ok_or(LinkError::CharacteristicNotFound(UART_RX_UUID))
}

/// Drop a connection whose setup failed; `disconnect` only runs on error
pub(crate) async fn disconnect_on_error<T, D, E>(
    result: Result<T, LinkError>,
    disconnect: D,
) -> Result<T, LinkError>
where
    D: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    if result.is_err() {
        if let Err(e) = disconnect.await {
            log::warn!("Failed to disconnect after setup error: {}", e);
        }
    }
    result
}

impl UartLink for BtleLink {
    async fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(p) => p.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let adapter = get_adapter().await?;
        let peripheral = find_device(&adapter, &self.target, self.scan_duration).await?;

        peripheral.connect().await?;
        let rx = disconnect_on_error(locate_rx(&peripheral).await, peripheral.disconnect()).await?;

        self.peripheral = Some(peripheral);
        self.rx = Some(rx);
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), LinkError> {
        let (Some(peripheral), Some(rx)) = (&self.peripheral, &self.rx) else {
            return Err(LinkError::NotConnected);
        };
        peripheral.write(rx, chunk, WriteType::WithResponse).await?;
        Ok(())
    }
}
