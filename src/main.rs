//! joybridge - main application
//!
//! Watches for Joy-Cons and Pro Controllers and exposes them as virtual
//! Xbox 360 pads. On Windows the pads are published through ViGEmBus;
//! elsewhere the bridge runs against the mock gamepad backend as a dry run.

use anyhow::Context;
use joybridge::backend::{GamepadBackend, HidapiBackend};
use joybridge::mapping::config::Config;
use joybridge::ControllerManager;
use log::{info, warn};
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== joybridge ===");
    info!("Pair your controllers over Bluetooth; they are picked up automatically.");

    let config = match Config::load_default() {
        Ok(config) => config,
        Err(e) => {
            warn!("Using built-in defaults: {}", e);
            Config::default()
        }
    };

    let hid = HidapiBackend::new().context("failed to initialise HID")?;

    #[cfg(windows)]
    let gamepad = joybridge::backend::get_gamepad_backend().context("ViGEmBus is required")?;

    #[cfg(not(windows))]
    let gamepad = {
        warn!("No virtual gamepad bus on this platform, running with the mock backend");
        joybridge::backend::get_mock_gamepad_backend()
    };

    run(config, hid, gamepad)
}

fn run<G: GamepadBackend>(config: Config, hid: HidapiBackend, gamepad: G) -> anyhow::Result<()> {
    let mut manager = ControllerManager::new(config, hid, gamepad);
    manager.start().context("failed to start the controller manager")?;

    info!("Manager started! Press Ctrl+C to stop");

    // Keep the main thread alive
    loop {
        thread::sleep(Duration::from_secs(1));

        if !manager.is_running() {
            info!("Manager stopped");
            break;
        }
    }

    Ok(())
}
