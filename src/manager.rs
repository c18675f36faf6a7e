//! High-level controller manager
//!
//! This module wires the pieces together: device sessions feed raw frames
//! to a dispatcher thread, which decodes them and updates the virtual pads
//! held by the registry. An optional watcher thread polls HID enumeration
//! and registers or reconnects controllers as they come and go.

use crate::backend::{GamepadBackend, HidBackend, HidConnection};
use crate::joycon::battery::notify_low_battery;
use crate::joycon::colors::{color_hex, color_name};
use crate::joycon::connection::{open_device, ConnectionError, ConnectionState, ControllerEvent, DeviceSession};
use crate::joycon::device_cache::ControllerCache;
use crate::joycon::{ControllerKind, InputReport};
use crate::mapping::{Config, ReportTranslator};
use crate::registry::{ControllerRegistry, RegistryError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;

/// How long the dispatcher waits for an event before rechecking `running`
const DISPATCH_WAKE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Manager is already running")]
    AlreadyRunning,

    #[error("Unknown controller product id 0x{product_id:04X}")]
    UnknownControllerKind { product_id: u16 },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to spawn thread: {0}")]
    Thread(#[from] std::io::Error),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared between the manager handle and its threads
struct Shared<H: HidBackend, G: GamepadBackend> {
    config: Config,
    hid: Arc<H>,
    gamepad: G,
    registry: Arc<ControllerRegistry>,
    translator: ReportTranslator,
    sessions: Mutex<HashMap<String, DeviceSession>>,
    cache: Mutex<ControllerCache>,
    event_sender: Sender<ControllerEvent>,
    running: AtomicBool,
}

impl<H: HidBackend, G: GamepadBackend> Shared<H, G> {
    fn register_device(&self, id: &str, serial: &str) -> Result<usize, ManagerError> {
        if self.registry.contains(id) {
            return Err(RegistryError::AlreadyRegistered(id.to_string()).into());
        }

        let settings = self.config.session_settings();
        let (descriptor, conn) = open_device(self.hid.as_ref(), serial, &settings.open_policy)?;
        let kind = ControllerKind::from_product_id(descriptor.product_id).ok_or(
            ManagerError::UnknownControllerKind {
                product_id: descriptor.product_id,
            },
        )?;

        if let Some(known) = lock(&self.cache).get_controller(serial) {
            info!("Welcome back, {} ({})", known.display_name(), serial);
        }

        let index = self.registry.register(id, serial, kind, &self.gamepad)?;
        self.spawn_session(id, serial, Some(conn), index)?;
        Ok(index)
    }

    fn spawn_session(
        &self,
        id: &str,
        serial: &str,
        opened: Option<Box<dyn HidConnection>>,
        index: usize,
    ) -> Result<(), ManagerError> {
        let mut settings = self.config.session_settings();
        if self.config.input.player_lights {
            settings.player_lights = Some(1 << (index % 4));
        }

        // The old session's last events must be queued before the new one's
        self.stop_session(id);

        let hid: Arc<dyn HidBackend> = self.hid.clone();
        let session = DeviceSession::spawn(id, serial, hid, opened, settings, self.event_sender.clone())?;
        lock(&self.sessions).insert(id.to_string(), session);
        Ok(())
    }

    fn stop_session(&self, id: &str) {
        let session = lock(&self.sessions).remove(id);
        if let Some(mut session) = session {
            session.stop();
            debug!("Stopped session {}", session.id());
        }
    }

    fn unregister_device(&self, id: &str) -> bool {
        self.stop_session(id);
        self.translator.forget(id);
        self.registry.unregister(id).is_some()
    }

    fn notify_connection_changed(&self, id: &str, connected: bool) -> Result<(), ManagerError> {
        if !connected {
            info!("{} disconnected", id);
            self.stop_session(id);
            self.registry.set_state(id, ConnectionState::Disconnected);
            return Ok(());
        }

        let Some(record) = self.registry.physical(id) else {
            warn!("Connection change for unregistered device {}", id);
            return Ok(());
        };
        let live = lock(&self.sessions).get(id).map_or(false, |s| !s.is_finished());
        if live {
            debug!("{} reconnected with a session still running, replacing it", id);
        }

        info!("{} reconnected, opening transport", id);
        let index = self.registry.mapping_for(id).unwrap_or(0);
        self.spawn_session(id, &record.serial, None, index)
    }

    fn handle_event(&self, event: ControllerEvent) {
        match event {
            ControllerEvent::StateChanged { id, state } => {
                self.registry.set_state(&id, state);
                if state == ConnectionState::Streaming {
                    info!("{} streaming", id);
                }
            }
            ControllerEvent::Negotiated {
                id,
                calibration,
                body_color,
            } => {
                self.translator.forget(&id);
                self.registry.set_negotiated(&id, calibration, body_color);

                let color = body_color.map(|rgb| {
                    let hex = color_hex(&rgb);
                    info!("{} body colour #{} ({})", id, hex, color_name(&hex));
                    color_name(&hex).to_string()
                });
                if self.config.cache.enabled {
                    if let Some(record) = self.registry.physical(&id) {
                        let mut cache = lock(&self.cache);
                        cache.add_controller(&record.serial, record.kind, color);
                        if let Err(e) = cache.save() {
                            warn!("Failed to save controller cache: {}", e);
                        }
                    }
                }
            }
            ControllerEvent::Report { id, frame } => self.handle_report(&id, &frame),
        }
    }

    fn handle_report(&self, id: &str, frame: &[u8]) {
        let report = match InputReport::parse(frame) {
            Ok(report) => report,
            Err(e) => {
                debug!("{}: dropped frame: {}", id, e);
                return;
            }
        };
        let (Some(kind), Some(pad)) = (self.registry.kind_of(id), self.registry.virtual_for(id)) else {
            debug!("{}: report from unregistered device dropped", id);
            return;
        };

        if let InputReport::Full(full) = &report {
            if self.registry.update_battery(id, full.battery) && self.config.battery.low_battery_alert {
                notify_low_battery(&format!("{} {}", kind, id), full.battery);
            }
        }

        let calibration = self.registry.calibration_of(id);
        let mut pad = lock(pad.as_ref());
        if let Err(e) = self.translator.apply(id, kind, &report, calibration.as_ref(), &mut pad) {
            error!("{}: {}", id, e);
            return;
        }
        if let Err(e) = pad.commit() {
            warn!("Virtual pad #{} update failed: {}", pad.index(), e);
        }
        trace!("{}: applied report 0x{:02X}", id, report.report_id());
    }

    fn dispatch_loop(&self, receiver: Receiver<ControllerEvent>) {
        info!("Dispatcher thread started");
        while self.running.load(Ordering::SeqCst) {
            match receiver.recv_timeout(DISPATCH_WAKE) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Event channel disconnected");
                    break;
                }
            }
        }
        info!("Dispatcher thread stopped");
    }

    /// One watcher pass over the enumerated devices
    fn poll_devices(&self) {
        let devices = match self.hid.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Enumeration failed: {}", e);
                return;
            }
        };
        let present: HashMap<String, Option<String>> = devices
            .into_iter()
            .filter(|d| ControllerKind::from_product_id(d.product_id).is_some())
            .map(|d| (d.serial, d.product))
            .collect();

        for id in self.registry.ids() {
            let Some(record) = self.registry.physical(&id) else {
                continue;
            };
            let is_present = present.contains_key(&record.serial);
            let result = match (is_present, record.state) {
                (false, state) if state != ConnectionState::Disconnected => {
                    self.notify_connection_changed(&id, false)
                }
                (true, ConnectionState::Disconnected) => self.notify_connection_changed(&id, true),
                _ => Ok(()),
            };
            if let Err(e) = result {
                warn!("{}: {}", id, e);
            }
        }

        for (serial, product) in present {
            // Devices registered by the caller may use a transport id other than the serial
            if self.registry.contains_serial(&serial) || !self.running.load(Ordering::SeqCst) {
                continue;
            }
            info!(
                "Found new controller {} ({})",
                serial,
                product.as_deref().unwrap_or("unnamed")
            );
            if let Err(e) = self.register_device(&serial, &serial) {
                warn!("Could not register {}: {}", serial, e);
            }
        }
    }

    fn watch_loop(&self) {
        let rt = match Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create tokio runtime: {}", e);
                return;
            }
        };
        let interval = self.config.watcher_interval();

        rt.block_on(async {
            info!("Watcher thread started");
            while self.running.load(Ordering::SeqCst) {
                self.poll_devices();

                // Sleep in short steps so stop() is not held up
                let mut slept = Duration::ZERO;
                while slept < interval && self.running.load(Ordering::SeqCst) {
                    let step = DISPATCH_WAKE.min(interval - slept);
                    tokio::time::sleep(step).await;
                    slept += step;
                }
            }
            info!("Watcher thread exited");
        });
    }
}

/// Manager for Joy-Con and Pro Controllers
pub struct ControllerManager<H: HidBackend, G: GamepadBackend> {
    shared: Arc<Shared<H, G>>,
    event_receiver: Receiver<ControllerEvent>,
    threads: Vec<JoinHandle<()>>,
}

impl<H: HidBackend, G: GamepadBackend> ControllerManager<H, G> {
    /// Create a new manager
    pub fn new(config: Config, hid: H, gamepad: G) -> Self {
        let (event_sender, event_receiver) = unbounded();

        let cache = if config.cache.enabled {
            let cache = ControllerCache::load();
            info!("Loaded {} cached controllers", cache.len());
            cache
        } else {
            ControllerCache::new()
        };

        let shared = Shared {
            translator: ReportTranslator::new(config.input.stick_deadzone),
            config,
            hid: Arc::new(hid),
            gamepad,
            registry: Arc::new(ControllerRegistry::new()),
            sessions: Mutex::new(HashMap::new()),
            cache: Mutex::new(cache),
            event_sender,
            running: AtomicBool::new(false),
        };

        Self {
            shared: Arc::new(shared),
            event_receiver,
            threads: Vec::new(),
        }
    }

    /// Start the dispatcher and, if enabled, the hot-plug watcher
    pub fn start(&mut self) -> Result<(), ManagerError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(ManagerError::AlreadyRunning);
        }
        info!("Starting controller manager...");

        let shared = Arc::clone(&self.shared);
        let receiver = self.event_receiver.clone();
        let dispatcher = thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || shared.dispatch_loop(receiver));
        match dispatcher {
            Ok(handle) => self.threads.push(handle),
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        }

        if self.shared.config.watcher.enabled {
            let shared = Arc::clone(&self.shared);
            let watcher = thread::Builder::new()
                .name("watcher".to_string())
                .spawn(move || shared.watch_loop());
            match watcher {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    self.stop();
                    return Err(e.into());
                }
            }
        }

        info!("✓ Manager started");
        Ok(())
    }

    /// Stop all sessions and threads
    pub fn stop(&mut self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        let sessions: Vec<DeviceSession> = lock(&self.shared.sessions).drain().map(|(_, s)| s).collect();
        if !was_running && sessions.is_empty() && self.threads.is_empty() {
            return;
        }

        info!("Stopping controller manager...");
        for mut session in sessions {
            session.stop();
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("Manager thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Register a device that finished pairing.
    ///
    /// Opens the transport (with retry) to learn the controller kind,
    /// assigns a virtual pad and starts the device session. Returns the pad
    /// index.
    pub fn register_device(&self, transport_id: &str, serial: &str) -> Result<usize, ManagerError> {
        self.shared.register_device(transport_id, serial)
    }

    /// Remove a device permanently. Its virtual pad is kept.
    pub fn unregister_device(&self, transport_id: &str) -> bool {
        self.shared.unregister_device(transport_id)
    }

    /// Transport-level connection change of a registered device
    pub fn notify_connection_changed(&self, transport_id: &str, connected: bool) -> Result<(), ManagerError> {
        self.shared.notify_connection_changed(transport_id, connected)
    }

    pub fn registry(&self) -> Arc<ControllerRegistry> {
        Arc::clone(&self.shared.registry)
    }
}

impl<H: HidBackend, G: GamepadBackend> Drop for ControllerManager<H, G> {
    fn drop(&mut self) {
        self.stop();
    }
}
