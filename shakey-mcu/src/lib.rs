//! Shakey MCU Library
//!
//! The peripheral half of Shakey: a wearable that types a configured string
//! over BLE HID whenever it is shaken, and accepts new strings from the host
//! over the Nordic UART service.
//!
//! This crate provides:
//! - The [`Controller`] state machine (advertise, reassemble, shake, type)
//! - Traits for the BLE server, motion sensor and HID keyboard
//! - The character -> HID keycode table
//!
//! Board bring-up and drivers live in MCU-specific crates that implement
//! [`BleServer`], [`MotionSensor`] and [`Keyboard`], then hand them to
//! [`Controller::run`].

pub mod ble;
pub mod config;
pub mod controller;
pub mod keyboard;
pub mod sensor;

pub use ble::*;
pub use config::DeviceConfig;
pub use controller::{ConnectionState, Controller, ControllerError};
pub use keyboard::*;
pub use sensor::*;
