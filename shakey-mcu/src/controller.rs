//! Peripheral controller - advertising/connection state machine
//!
//! One cooperative loop owns everything: it waits for a central, then
//! alternates between draining the UART and checking for a shake. Typing a
//! binding blocks the loop, so no packets are reassembled meanwhile.

use log::*;
use shakey_proto::{BindingMessage, Reassembler, ReassemblyError};

use crate::ble::BleServer;
use crate::config::DeviceConfig;
use crate::keyboard::{type_string, Keyboard};
use crate::sensor::MotionSensor;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Advertising,
    Connected,
    Disconnected,
}

/// Errors that end a connected session
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("keyboard error: {0}")]
    Keyboard(String),
}

pub struct Controller<B, S, K> {
    ble: B,
    sensor: S,
    keyboard: K,
    config: DeviceConfig,
    state: ConnectionState,
    advertising: bool,
    reassembler: Reassembler,
    shake_action: String,
}

impl<B: BleServer, S: MotionSensor, K: Keyboard> Controller<B, S, K> {
    pub fn new(ble: B, sensor: S, keyboard: K, config: DeviceConfig) -> Self {
        Self {
            ble,
            sensor,
            keyboard,
            state: ConnectionState::Advertising,
            advertising: false,
            reassembler: Reassembler::new(config.max_message_len),
            shake_action: config.default_string.clone(),
            config,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// String typed on the next shake
    pub fn shake_action(&self) -> &str {
        &self.shake_action
    }

    /// Partially received message text
    pub fn pending(&self) -> &str {
        self.reassembler.pending()
    }

    // Collaborator access for board code (bonding, calibration, LEDs) that
    // has to reach the drivers while the controller owns them.

    pub fn ble(&self) -> &B {
        &self.ble
    }

    pub fn ble_mut(&mut self) -> &mut B {
        &mut self.ble
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    /// Run the state machine forever
    pub fn run(&mut self) -> ! {
        info!("Starting BLE...");
        loop {
            self.step();
        }
    }

    /// Advance by one transition or one service iteration
    pub fn step(&mut self) {
        match self.state {
            ConnectionState::Advertising => self.advertise(),
            ConnectionState::Connected => {
                if let Err(e) = self.service() {
                    error!("Error: {}", e);
                    self.state = ConnectionState::Disconnected;
                }
            }
            ConnectionState::Disconnected => self.recover(),
        }
    }

    fn advertise(&mut self) {
        if !self.advertising {
            let advertisement = self.config.advertisement();
            if let Err(e) = self.ble.start_advertising(&advertisement) {
                error!("Failed to start advertising: {}", e);
                std::thread::sleep(self.config.reconnect_pause);
                return;
            }
            self.advertising = true;
            info!("Advertising started as '{}'", advertisement.name);
        }

        match self.ble.wait_for_connection(self.config.connect_poll) {
            Ok(true) => {
                self.reassembler.clear();
                self.state = ConnectionState::Connected;
                info!("Connected");
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Waiting for connection failed: {}", e);
                std::thread::sleep(self.config.connect_poll);
            }
        }
    }

    fn recover(&mut self) {
        info!("Disconnected");
        if let Err(e) = self.ble.stop_advertising() {
            warn!("Failed to stop advertising: {}", e);
        }
        self.advertising = false;
        std::thread::sleep(self.config.reconnect_pause);
        self.state = ConnectionState::Advertising;
    }

    fn service(&mut self) -> Result<(), ControllerError> {
        if !self.ble.is_connected() {
            self.state = ConnectionState::Disconnected;
            return Ok(());
        }

        let chunk = self
            .ble
            .read_uart()
            .map_err(|e| ControllerError::Transport(e.to_string()))?;
        if let Some(chunk) = chunk {
            self.on_bytes_received(&chunk);
        }

        match self.poll_shake(self.config.shake_threshold) {
            Ok(true) => {
                self.emit_shake_action()?;
                std::thread::sleep(self.config.emit_cooldown);
            }
            Ok(false) => {}
            Err(e) => debug!("Skipping shake check: {}", e),
        }
        Ok(())
    }

    /// Feed one UART packet; returns the message it completed, if any
    pub fn on_bytes_received(&mut self, chunk: &[u8]) -> Option<BindingMessage> {
        debug!("Received chunk: {}", String::from_utf8_lossy(chunk));

        match self.reassembler.push(chunk) {
            Ok(Some(message)) => {
                if let Some(keys) = message.shake_action_keys() {
                    self.shake_action = keys.to_string();
                    info!("Updated key binding: {}", self.shake_action);
                }
                Some(message)
            }
            Ok(None) => None,
            Err(e @ ReassemblyError::InvalidUtf8(_)) => {
                warn!("Dropping fragment: {}", e);
                None
            }
            Err(e) => {
                error!("Discarding message: {}", e);
                None
            }
        }
    }

    /// Read the sensor and check it against `threshold`
    pub fn poll_shake(&mut self, threshold: f32) -> Result<bool, S::Error> {
        Ok(self.sensor.acceleration()?.exceeds(threshold))
    }

    /// Type `text` on the HID keyboard
    pub fn emit(&mut self, text: &str) -> Result<usize, ControllerError> {
        type_on(&mut self.keyboard, text, self.config.key_delay)
    }

    fn emit_shake_action(&mut self) -> Result<usize, ControllerError> {
        info!("Shake detected, typing {:?}", self.shake_action);
        type_on(&mut self.keyboard, &self.shake_action, self.config.key_delay)
    }
}

fn type_on<K: Keyboard>(
    keyboard: &mut K,
    text: &str,
    key_delay: std::time::Duration,
) -> Result<usize, ControllerError> {
    type_string(keyboard, text, key_delay).map_err(|e| ControllerError::Keyboard(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::Advertisement;
    use crate::keyboard::Keycode;
    use crate::sensor::Acceleration;
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct FakeBle {
        advertising: bool,
        advertisements: Vec<Advertisement>,
        connected: bool,
        pending_connect: bool,
        fail_read: bool,
        fail_wait: bool,
        uart: VecDeque<Vec<u8>>,
    }

    impl BleServer for FakeBle {
        type Error = String;

        fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<(), String> {
            self.advertising = true;
            self.advertisements.push(advertisement.clone());
            Ok(())
        }

        fn stop_advertising(&mut self) -> Result<(), String> {
            self.advertising = false;
            Ok(())
        }

        fn wait_for_connection(&mut self, _timeout: Duration) -> Result<bool, String> {
            if self.fail_wait {
                return Err("controller busy".to_string());
            }
            if self.pending_connect {
                self.pending_connect = false;
                self.connected = true;
            }
            Ok(self.connected)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn read_uart(&mut self) -> Result<Option<Vec<u8>>, String> {
            if self.fail_read {
                return Err("uart gone".to_string());
            }
            Ok(self.uart.pop_front())
        }
    }

    #[derive(Default)]
    struct FakeSensor {
        samples: VecDeque<Result<Acceleration, String>>,
    }

    impl MotionSensor for FakeSensor {
        type Error = String;

        fn acceleration(&mut self) -> Result<Acceleration, String> {
            self.samples
                .pop_front()
                .unwrap_or(Ok(Acceleration::new(0.0, 0.0, 9.8)))
        }
    }

    #[derive(Default)]
    struct FakeKeyboard {
        pressed: Vec<(Keycode, Instant)>,
        releases: usize,
        unplugged: bool,
    }

    impl Keyboard for FakeKeyboard {
        type Error = String;

        fn press(&mut self, key: Keycode) -> Result<(), String> {
            if self.unplugged {
                return Err("hid report failed".to_string());
            }
            self.pressed.push((key, Instant::now()));
            Ok(())
        }

        fn release_all(&mut self) -> Result<(), String> {
            self.releases += 1;
            Ok(())
        }
    }

    impl FakeKeyboard {
        fn keys(&self) -> Vec<Keycode> {
            self.pressed.iter().map(|(k, _)| *k).collect()
        }
    }

    fn quick_config() -> DeviceConfig {
        DeviceConfig {
            connect_poll: Duration::ZERO,
            emit_cooldown: Duration::ZERO,
            key_delay: Duration::ZERO,
            reconnect_pause: Duration::ZERO,
            ..DeviceConfig::default()
        }
    }

    fn controller() -> Controller<FakeBle, FakeSensor, FakeKeyboard> {
        Controller::new(
            FakeBle::default(),
            FakeSensor::default(),
            FakeKeyboard::default(),
            quick_config(),
        )
    }

    fn connect(c: &mut Controller<FakeBle, FakeSensor, FakeKeyboard>) {
        c.ble_mut().pending_connect = true;
        c.step();
        assert_eq!(c.state(), ConnectionState::Connected);
    }

    #[test]
    fn advertises_until_connected() {
        let mut c = controller();
        assert_eq!(c.state(), ConnectionState::Advertising);

        c.step();
        c.step();
        assert_eq!(c.state(), ConnectionState::Advertising);
        assert!(c.ble().advertising);
        // advertisement is started once, not on every poll
        assert_eq!(c.ble().advertisements.len(), 1);
        assert_eq!(c.ble().advertisements[0].name, "XIAO");
        assert_eq!(c.ble().advertisements[0].services.len(), 2);

        connect(&mut c);
    }

    #[test]
    fn failed_connection_wait_backs_off() {
        let poll = Duration::from_millis(15);
        let mut c = Controller::new(
            FakeBle {
                fail_wait: true,
                ..FakeBle::default()
            },
            FakeSensor::default(),
            FakeKeyboard::default(),
            DeviceConfig {
                connect_poll: poll,
                ..quick_config()
            },
        );

        let started = Instant::now();
        c.step();
        c.step();
        assert!(started.elapsed() >= poll * 2);
        assert_eq!(c.state(), ConnectionState::Advertising);
        assert_eq!(c.ble().advertisements.len(), 1);
    }

    #[test]
    fn full_lifecycle() {
        let mut c = controller();
        connect(&mut c);

        c.ble_mut().connected = false;
        c.step();
        assert_eq!(c.state(), ConnectionState::Disconnected);

        c.step();
        assert_eq!(c.state(), ConnectionState::Advertising);
        assert!(!c.ble().advertising);

        connect(&mut c);
        assert_eq!(c.ble().advertisements.len(), 2);
    }

    #[test]
    fn applies_shake_action() {
        let mut c = controller();
        assert_eq!(c.shake_action(), "Hello World");

        let json = BindingMessage::shake_action("OK").to_json().unwrap();
        let fragments = shakey_proto::split_into_fragments(&json, 20).unwrap();
        let mut completed = Vec::new();
        for f in &fragments {
            completed.extend(c.on_bytes_received(f));
        }
        assert_eq!(completed.len(), 1);
        assert_eq!(c.shake_action(), "OK");
    }

    #[test]
    fn other_bindings_leave_state_alone() {
        let mut c = controller();
        let msg = c
            .on_bytes_received(br#"{"key_bindings": [{"name": "TapAction", "keys": "x"}]}"#)
            .unwrap();
        assert_eq!(msg.key_bindings.len(), 1);
        assert_eq!(c.shake_action(), "Hello World");

        c.on_bytes_received(br#"{"key_bindings": [{"name": "ShakeAction"}]}"#)
            .unwrap();
        assert_eq!(c.shake_action(), "Hello World");
    }

    #[test]
    fn recovers_from_bad_json() {
        let mut c = controller();
        assert!(c.on_bytes_received(b"{bad json}").is_none());
        assert_eq!(c.pending(), "");
        assert_eq!(c.shake_action(), "Hello World");

        c.on_bytes_received(br#"{"key_bindings": [{"name": "ShakeAction", "keys": "v"}]}"#);
        assert_eq!(c.shake_action(), "v");
    }

    #[test]
    fn reconnect_drops_partial_message() {
        let mut c = controller();
        connect(&mut c);

        c.ble_mut().uart.push_back(br#"{"key_bindings": [{"na"#.to_vec());
        c.step();
        assert!(!c.pending().is_empty());

        c.ble_mut().connected = false;
        c.step();
        c.step();
        connect(&mut c);
        assert_eq!(c.pending(), "");

        c.ble_mut()
            .uart
            .push_back(br#"{"key_bindings": [{"name": "ShakeAction", "keys": "new"}]}"#.to_vec());
        c.step();
        assert_eq!(c.shake_action(), "new");
    }

    #[test]
    fn transport_error_disconnects() {
        let mut c = controller();
        connect(&mut c);
        c.ble_mut().fail_read = true;
        c.step();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        c.ble_mut().fail_read = false;
        c.step();
        assert_eq!(c.state(), ConnectionState::Advertising);
    }

    #[test]
    fn shake_types_binding() {
        let mut c = controller();
        connect(&mut c);

        c.sensor_mut()
            .samples
            .push_back(Ok(Acceleration::new(20.0, -20.0, 20.0)));
        c.step();
        assert!(c.keyboard().pressed.is_empty());

        c.sensor_mut()
            .samples
            .push_back(Ok(Acceleration::new(0.0, 25.0, 0.0)));
        c.step();
        assert_eq!(c.keyboard().keys().len(), "HelloWorld".len() + 1);
        assert_eq!(c.keyboard().releases, 11);
    }

    #[test]
    fn keyboard_error_disconnects() {
        let mut c = controller();
        connect(&mut c);
        c.keyboard.unplugged = true;
        c.sensor_mut()
            .samples
            .push_back(Ok(Acceleration::new(30.0, 0.0, 0.0)));
        c.step();
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(c.keyboard().pressed.is_empty());
    }

    #[test]
    fn sensor_error_skips_iteration() {
        let mut c = controller();
        connect(&mut c);
        c.sensor_mut().samples.push_back(Err("i2c nak".to_string()));
        c.step();
        assert_eq!(c.state(), ConnectionState::Connected);
        assert!(c.keyboard().pressed.is_empty());
    }

    #[test]
    fn emit_maps_case_and_space() {
        let mut c = controller();
        c.emit("Hi a").unwrap();
        assert_eq!(
            c.keyboard().keys(),
            vec![Keycode::H, Keycode::I, Keycode::SPACE, Keycode::A]
        );
    }

    #[test]
    fn emit_paces_keys() {
        let delay = Duration::from_millis(15);
        let mut c = Controller::new(
            FakeBle::default(),
            FakeSensor::default(),
            FakeKeyboard::default(),
            DeviceConfig {
                key_delay: delay,
                ..quick_config()
            },
        );
        c.emit("OK").unwrap();
        let pressed = &c.keyboard().pressed;
        assert_eq!(pressed.len(), 2);
        assert!(pressed[1].1.duration_since(pressed[0].1) >= delay);
    }
}
