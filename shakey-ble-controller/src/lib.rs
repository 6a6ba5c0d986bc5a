//! Shakey BLE Controller Library
//!
//! Host-side client for Shakey devices: finds the device, connects to its
//! UART service and sends the string it should type when shaken.
//!
//! # Example
//!
//! ```no_run
//! use shakey_ble_controller::{BindingSender, BtleLink, HostConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HostConfig::load()?;
//!     let link = BtleLink::new(config.target(), config.scan_duration());
//!     let mut sender = BindingSender::from_config(link, &config);
//!
//!     sender.send_binding("Hello").await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod config;
pub mod link;
pub mod sender;
pub mod worker;

pub use ble::{ShakeyDevice, ServiceInfo, discover, scan};
pub use config::{ConfigError, HostConfig, shakey_home};
pub use link::{BtleLink, LinkError, UartLink};
pub use sender::{BindingSender, Connected, ConnectionError, SendError, Sent};
pub use worker::{Request, Status, WorkerClosed, WorkerHandle, spawn_worker};
