//! End-to-end tests: mock HID devices through the manager to mock pads

use joybridge::backend::{MockGamepadBackend, MockHidBackend};
use joybridge::gamepad::{GamepadState, XAxis, XButton, XTrigger};
use joybridge::joycon::constants::*;
use joybridge::joycon::ConnectionState;
use joybridge::mapping::Config;
use joybridge::manager::{ControllerManager, ManagerError};
use joybridge::registry::RegistryError;
use joybridge::ControllerRegistry;
use std::thread;
use std::time::{Duration, Instant};

type Manager = ControllerManager<MockHidBackend, MockGamepadBackend>;

fn test_config(watcher: bool) -> Config {
    let mut config = Config::default();
    config.connection.open_attempts = 3;
    config.connection.open_retry_delay_ms = 0;
    config.connection.reply_timeout_ms = 1;
    config.connection.read_wake_ms = 5;
    config.watcher.enabled = watcher;
    config.watcher.poll_interval_ms = 20;
    config.cache.enabled = false;
    config
}

fn setup(watcher: bool) -> (Manager, MockHidBackend, MockGamepadBackend) {
    let _ = env_logger::builder().is_test(true).try_init();
    let hid = MockHidBackend::new();
    let pads = MockGamepadBackend::new();
    let mut manager = ControllerManager::new(test_config(watcher), hid.clone(), pads.clone());
    manager.start().unwrap();
    (manager, hid, pads)
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

fn wait_for_state(registry: &ControllerRegistry, id: &str, state: ConnectionState) {
    wait_until(&format!("{} to be {:?}", id, state), || registry.state_of(id) == Some(state));
}

fn pad_state(registry: &ControllerRegistry, id: &str) -> GamepadState {
    let pad = registry.virtual_for(id).unwrap();
    let state = pad.lock().unwrap().state();
    state
}

fn simple_frame(byte1: u8, byte2: u8, hat: u8) -> Vec<u8> {
    let mut frame = vec![0u8; REPORT_LEN];
    frame[..4].copy_from_slice(&[REPORT_ID_SIMPLE, byte1, byte2, hat]);
    frame
}

fn light_commands(hid: &MockHidBackend, serial: &str) -> usize {
    hid.writes(serial)
        .iter()
        .filter(|w| w.get(SUBCOMMAND_OFFSET) == Some(&SUBCMD_SET_PLAYER_LIGHTS))
        .count()
}

#[test]
fn test_left_then_right_share_one_pad() {
    let (manager, hid, pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);
    hid.add_device("R1", JOYCON_RIGHT_PRODUCT_ID);

    assert_eq!(manager.register_device("L1", "L1").unwrap(), 0);
    assert_eq!(manager.register_device("R1", "R1").unwrap(), 0);
    assert_eq!(registry.virtual_count(), 1);
    assert_eq!(pads.created(), 1);

    wait_for_state(&registry, "L1", ConnectionState::Streaming);
    wait_for_state(&registry, "R1", ConnectionState::Streaming);
    assert_eq!(hid.player_lights("L1"), Some(0x01));
    assert_eq!(hid.player_lights("R1"), Some(0x01));

    hid.push_input("L1", &simple_frame(0x01, 0x00, 8));
    wait_until("Left pressed", || pad_state(&registry, "L1").button(XButton::Left));

    hid.push_input("R1", &simple_frame(0x01, 0x00, 8));
    wait_until("A pressed", || pad_state(&registry, "R1").button(XButton::A));
    assert!(pad_state(&registry, "L1").button(XButton::Left));

    let published = pads.last_report(0).unwrap();
    assert!(published.button(XButton::Left));
    assert!(published.button(XButton::A));
}

#[test]
fn test_pro_controller_full_mode() {
    let (manager, hid, pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("P1", PRO_CONTROLLER_PRODUCT_ID);
    // Left stick: max 0x400, center 0x800, min 0x400 on both axes
    hid.set_flash("P1", SPI_LEFT_STICK_CALIBRATION, &[0x00, 0x04, 0x40, 0x00, 0x08, 0x80, 0x00, 0x04, 0x40]);
    // Right stick layout: center, min, max
    hid.set_flash("P1", SPI_RIGHT_STICK_CALIBRATION, &[0x00, 0x08, 0x80, 0x00, 0x04, 0x40, 0x00, 0x04, 0x40]);
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);

    let pro = manager.register_device("P1", "P1").unwrap();
    let joycon = manager.register_device("L1", "L1").unwrap();
    assert_ne!(pro, joycon);
    assert_eq!(pads.created(), 2);

    wait_for_state(&registry, "P1", ConnectionState::Streaming);
    assert_eq!(hid.input_mode("P1"), Some(REPORT_ID_FULL));

    let mut frame = vec![0u8; REPORT_LEN];
    frame[0] = REPORT_ID_FULL;
    frame[2] = 0x80;
    frame[3] = 0x08; // A
    frame[5] = 0x80; // ZL
    // Left stick x fully right (0xC00), y centered; right stick centered
    frame[6..9].copy_from_slice(&[0x00, 0x0C, 0x80]);
    frame[9..12].copy_from_slice(&[0x00, 0x08, 0x80]);
    hid.push_input("P1", &frame);

    wait_until("A pressed", || pad_state(&registry, "P1").button(XButton::A));
    let state = pad_state(&registry, "P1");
    assert_eq!(state.trigger(XTrigger::Left), 0xFF);
    assert_eq!(state.axis(XAxis::LeftThumbX), i16::MAX);
    assert_eq!(state.axis(XAxis::LeftThumbY), 0);
    assert_eq!(state.axis(XAxis::RightThumbX), 0);

    // The Joy-Con's pad is untouched
    assert_eq!(pads.update_count(joycon), 0);
    assert!(registry.physical("P1").unwrap().battery.is_some());
}

#[test]
fn test_reconnect_reopens_transport() {
    let (manager, hid, _pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);

    manager.register_device("L1", "L1").unwrap();
    wait_for_state(&registry, "L1", ConnectionState::Streaming);
    assert_eq!(hid.open_count("L1"), 1);

    manager.notify_connection_changed("L1", false).unwrap();
    assert_eq!(registry.state_of("L1"), Some(ConnectionState::Disconnected));
    assert!(registry.contains("L1"));

    manager.notify_connection_changed("L1", true).unwrap();
    wait_for_state(&registry, "L1", ConnectionState::Streaming);
    assert_eq!(hid.open_count("L1"), 2);
    assert_eq!(registry.mapping_for("L1"), Some(0));

    hid.push_input("L1", &simple_frame(0x04, 0x00, 8));
    wait_until("Up pressed", || pad_state(&registry, "L1").button(XButton::Up));
}

#[test]
fn test_unregister_keeps_virtual_pad() {
    let (manager, hid, _pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);

    manager.register_device("L1", "L1").unwrap();
    assert!(manager.unregister_device("L1"));
    assert!(!registry.contains("L1"));
    assert_eq!(registry.virtual_count(), 1);
    assert!(!manager.unregister_device("L1"));
}

#[test]
fn test_registration_errors() {
    let (manager, hid, _pads) = setup(false);
    hid.add_device("X1", 0x200E);
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);

    assert!(matches!(
        manager.register_device("X1", "X1"),
        Err(ManagerError::UnknownControllerKind { product_id: 0x200E })
    ));
    assert!(matches!(
        manager.register_device("gone", "gone"),
        Err(ManagerError::Connection(_))
    ));

    manager.register_device("L1", "L1").unwrap();
    assert!(matches!(
        manager.register_device("L1", "L1"),
        Err(ManagerError::Registry(RegistryError::AlreadyRegistered(_)))
    ));
}

#[test]
fn test_start_twice_fails() {
    let (mut manager, _hid, _pads) = setup(false);
    assert!(manager.is_running());
    assert!(matches!(manager.start(), Err(ManagerError::AlreadyRunning)));
    manager.stop();
    assert!(!manager.is_running());
}

#[test]
fn test_watcher_follows_hot_plug() {
    let (manager, hid, _pads) = setup(true);
    let registry = manager.registry();

    hid.add_device("98:B6:E9:00:00:01", JOYCON_RIGHT_PRODUCT_ID);
    wait_for_state(&registry, "98:B6:E9:00:00:01", ConnectionState::Streaming);

    hid.set_present("98:B6:E9:00:00:01", false);
    wait_for_state(&registry, "98:B6:E9:00:00:01", ConnectionState::Disconnected);

    hid.set_present("98:B6:E9:00:00:01", true);
    wait_for_state(&registry, "98:B6:E9:00:00:01", ConnectionState::Streaming);
    assert_eq!(registry.virtual_count(), 1);
}

#[test]
fn test_watcher_skips_device_registered_under_transport_id() {
    let (manager, hid, pads) = setup(true);
    let registry = manager.registry();
    hid.add_device("98B6E9000001", JOYCON_LEFT_PRODUCT_ID);

    manager.register_device("BTHENUM#dev_98b6e9000001", "98B6E9000001").unwrap();
    wait_for_state(&registry, "BTHENUM#dev_98b6e9000001", ConnectionState::Streaming);

    // Several watcher passes
    thread::sleep(Duration::from_millis(150));
    assert_eq!(registry.ids(), vec!["BTHENUM#dev_98b6e9000001".to_string()]);
    assert_eq!(registry.virtual_count(), 1);
    assert_eq!(pads.created(), 1);
    assert_eq!(hid.open_count("98B6E9000001"), 1);

    assert!(matches!(
        manager.register_device("98B6E9000001", "98B6E9000001"),
        Err(ManagerError::Registry(RegistryError::AlreadyRegistered(_)))
    ));
}

#[test]
fn test_connected_notification_replaces_stuck_session() {
    let (manager, hid, _pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("L1", JOYCON_LEFT_PRODUCT_ID);

    manager.register_device("L1", "L1").unwrap();
    wait_for_state(&registry, "L1", ConnectionState::Streaming);

    // The transport keeps failing but never closes
    hid.fail_reads("L1", usize::MAX);
    manager.notify_connection_changed("L1", true).unwrap();
    wait_until("transport reopened", || hid.open_count("L1") == 2);
    // The new session sets the lights right before it starts streaming
    wait_until("lights set again", || light_commands(&hid, "L1") == 2);
    wait_for_state(&registry, "L1", ConnectionState::Streaming);

    hid.fail_reads("L1", 0);
    hid.push_input("L1", &simple_frame(0x04, 0x00, 8));
    wait_until("Up pressed", || pad_state(&registry, "L1").button(XButton::Up));
    assert_eq!(registry.mapping_for("L1"), Some(0));
}

#[test]
fn test_closed_transport_ends_session() {
    let (manager, hid, _pads) = setup(false);
    let registry = manager.registry();
    hid.add_device("R1", JOYCON_RIGHT_PRODUCT_ID);

    manager.register_device("R1", "R1").unwrap();
    wait_for_state(&registry, "R1", ConnectionState::Streaming);

    hid.set_present("R1", false);
    wait_for_state(&registry, "R1", ConnectionState::Disconnected);

    hid.set_present("R1", true);
    manager.notify_connection_changed("R1", true).unwrap();
    wait_for_state(&registry, "R1", ConnectionState::Streaming);
    assert_eq!(hid.open_count("R1"), 2);
}
