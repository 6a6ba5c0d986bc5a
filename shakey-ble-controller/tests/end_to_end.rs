//! Host sender driving the peripheral controller through an in-memory UART

use shakey_ble_controller::{BindingSender, LinkError, SendError, UartLink};
use shakey_mcu::{
    Acceleration, Advertisement, BleServer, ConnectionState, Controller, DeviceConfig, Keyboard,
    Keycode, MotionSensor,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Air = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Host end: writes land in the shared queue
struct HostEnd {
    air: Air,
    connected: bool,
}

impl UartLink for HostEnd {
    async fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        self.connected = true;
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), LinkError> {
        self.air.lock().unwrap().push_back(chunk.to_vec());
        Ok(())
    }
}

/// Device end: the UART RX characteristic reads from the shared queue
struct DeviceEnd {
    air: Air,
}

impl BleServer for DeviceEnd {
    type Error = String;

    fn start_advertising(&mut self, _: &Advertisement) -> Result<(), String> {
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn wait_for_connection(&mut self, _: Duration) -> Result<bool, String> {
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn read_uart(&mut self) -> Result<Option<Vec<u8>>, String> {
        Ok(self.air.lock().unwrap().pop_front())
    }
}

#[derive(Default)]
struct Shaker {
    shakes: VecDeque<Acceleration>,
}

impl MotionSensor for Shaker {
    type Error = String;

    fn acceleration(&mut self) -> Result<Acceleration, String> {
        Ok(self
            .shakes
            .pop_front()
            .unwrap_or(Acceleration::new(0.0, 0.0, 9.8)))
    }
}

#[derive(Default)]
struct RecordingKeyboard {
    pressed: Vec<(Keycode, Instant)>,
}

impl Keyboard for RecordingKeyboard {
    type Error = String;

    fn press(&mut self, key: Keycode) -> Result<(), String> {
        self.pressed.push((key, Instant::now()));
        Ok(())
    }

    fn release_all(&mut self) -> Result<(), String> {
        Ok(())
    }
}

const KEY_DELAY: Duration = Duration::from_millis(20);

struct Rig {
    air: Air,
    sender: BindingSender<HostEnd>,
    device: Controller<DeviceEnd, Shaker, RecordingKeyboard>,
}

impl Rig {
    fn new() -> Self {
        let air = Air::default();
        let sender = BindingSender::new(
            HostEnd {
                air: air.clone(),
                connected: false,
            },
            shakey_proto::ble::MAX_PACKET_SIZE,
            Duration::ZERO,
        );
        let device = Controller::new(
            DeviceEnd { air: air.clone() },
            Shaker::default(),
            RecordingKeyboard::default(),
            DeviceConfig {
                connect_poll: Duration::ZERO,
                emit_cooldown: Duration::ZERO,
                reconnect_pause: Duration::ZERO,
                key_delay: KEY_DELAY,
                ..DeviceConfig::default()
            },
        );
        let mut rig = Rig { air, sender, device };
        rig.device.step();
        assert_eq!(rig.device.state(), ConnectionState::Connected);
        rig
    }

    /// Step the device until every packet in flight is consumed
    fn deliver(&mut self) {
        while !self.air.lock().unwrap().is_empty() {
            self.device.step();
        }
    }

    fn shake(&mut self) -> Vec<Keycode> {
        self.device
            .sensor_mut()
            .shakes
            .push_back(Acceleration::new(30.0, 0.0, 0.0));
        self.device.step();
        self.device.keyboard().pressed.iter().map(|(k, _)| *k).collect()
    }
}

#[tokio::test]
async fn binding_reaches_the_keyboard() {
    let mut rig = Rig::new();

    let sent = rig.sender.send_binding("OK").await.unwrap();
    assert!(sent.fragments >= 2);
    assert!(rig.air.lock().unwrap().iter().all(|p| p.len() <= 20));

    rig.deliver();
    assert_eq!(rig.device.shake_action(), "OK");
    assert_eq!(rig.device.pending(), "");

    assert_eq!(rig.shake(), vec![Keycode::O, Keycode::K]);
    let pressed = &rig.device.keyboard().pressed;
    assert!(pressed[1].1.duration_since(pressed[0].1) >= KEY_DELAY);
}

#[tokio::test]
async fn bindings_round_trip() {
    let mut rig = Rig::new();

    for text in [
        "",
        "a",
        "Hello World",
        "line1\nline2\ttab",
        "quotes \" and \\ backslash",
        "héllo wörld ✓ 日本語",
        "braces } and {} inside",
        "a fairly long binding that spans many packets on the way to the device",
    ] {
        rig.sender.send_binding(text).await.unwrap();
        rig.deliver();
        assert_eq!(rig.device.shake_action(), text);
    }
}

#[tokio::test]
async fn brace_at_packet_end_is_lost() {
    let mut rig = Rig::new();
    rig.sender.send_binding("before").await.unwrap();
    rig.deliver();

    // A naive sender cutting right after an inner `}`
    let json = shakey_proto::BindingMessage::shake_action("x}tail")
        .to_json()
        .unwrap();
    let cut = json.find('}').unwrap() + 1;
    {
        let mut air = rig.air.lock().unwrap();
        air.push_back(json.as_bytes()[..cut].to_vec());
        air.push_back(json.as_bytes()[cut..].to_vec());
    }
    rig.deliver();
    assert_eq!(rig.device.shake_action(), "before");
    assert_eq!(rig.device.pending(), "");

    rig.sender.send_binding("after").await.unwrap();
    rig.deliver();
    assert_eq!(rig.device.shake_action(), "after");
}

#[tokio::test]
async fn unmapped_characters_are_skipped_when_typed() {
    let mut rig = Rig::new();
    rig.sender.send_binding("a!b").await.unwrap();
    rig.deliver();

    assert_eq!(rig.shake(), vec![Keycode::A, Keycode::B]);
}

#[tokio::test]
async fn host_and_device_agree_on_message_limit() {
    let mut rig = Rig::new();
    let overhead = shakey_proto::BindingMessage::shake_action("")
        .to_json()
        .unwrap()
        .len();
    let limit = shakey_proto::DEFAULT_MAX_MESSAGE_LEN;

    let longest = "a".repeat(limit - overhead);
    rig.sender.send_binding(&longest).await.unwrap();
    rig.deliver();
    assert_eq!(rig.device.shake_action(), longest);

    let too_long = "b".repeat(limit);
    assert!(matches!(
        rig.sender.send_binding(&too_long).await,
        Err(SendError::TooLong { .. })
    ));
    assert!(rig.air.lock().unwrap().is_empty());
    assert_eq!(rig.device.shake_action(), longest);
}
