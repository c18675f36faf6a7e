//! Physical controller connection management
//!
//! This module handles the HID connection to one physical controller:
//! locating and opening the device, the negotiation handshake, and the
//! read loop that forwards raw input frames to the dispatcher.
//!
//! Each device gets its own session thread which exclusively owns the open
//! handle and the command channel. The session only talks to the rest of
//! the program through [`ControllerEvent`]s.

use crate::backend::{BackendError, DeviceDescriptor, HidBackend, HidConnection};
use crate::joycon::calibration::FactoryCalibration;
use crate::joycon::codec::CodecError;
use crate::joycon::command::{CommandChannel, CommandError};
use crate::joycon::constants::*;
use crate::retry::RetryPolicy;
use crossbeam_channel::Sender;
use log::{debug, error, info, trace, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Negotiating,
    Streaming,
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Device {serial} not found after {attempts} attempts")]
    DeviceNotFound { serial: String, attempts: u32 },

    #[error("Negotiation failed: {0}")]
    Negotiation(#[from] CommandError),

    #[error("Calibration decode failed: {0}")]
    Codec(#[from] CodecError),
}

/// Messages from a device session to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged {
        id: String,
        state: ConnectionState,
    },
    Negotiated {
        id: String,
        calibration: Option<FactoryCalibration>,
        body_color: Option<[u8; 3]>,
    },
    Report {
        id: String,
        frame: Vec<u8>,
    },
}

/// Timing and retry settings for one session
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub open_policy: RetryPolicy,
    pub reply_policy: RetryPolicy,
    pub reply_timeout: Duration,
    pub read_wake: Duration,
    /// Player LED pattern to set after negotiation
    pub player_lights: Option<u8>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            open_policy: RetryPolicy::new(10, Duration::from_secs(1)),
            reply_policy: RetryPolicy::immediate(4),
            reply_timeout: Duration::from_millis(100),
            read_wake: Duration::from_millis(200),
            player_lights: None,
        }
    }
}

/// Locate the device with `serial` among the enumerated devices and open
/// it, retrying per `policy`.
pub fn open_device(
    hid: &dyn HidBackend,
    serial: &str,
    policy: &RetryPolicy,
) -> Result<(DeviceDescriptor, Box<dyn HidConnection>), ConnectionError> {
    policy
        .run(|attempt| {
            let descriptor = match hid.enumerate() {
                Ok(devices) => devices.into_iter().find(|d| d.serial == serial),
                Err(e) => {
                    debug!("Enumeration failed: {}", e);
                    None
                }
            };
            let Some(descriptor) = descriptor else {
                debug!("{} not enumerated (attempt {}/{})", serial, attempt, policy.max_attempts);
                return Err(());
            };
            match hid.open(&descriptor) {
                Ok(conn) => Ok((descriptor, conn)),
                Err(e) => {
                    debug!("Opening {} failed: {}", serial, e);
                    Err(())
                }
            }
        })
        .map_err(|_| ConnectionError::DeviceNotFound {
            serial: serial.to_string(),
            attempts: policy.max_attempts.max(1),
        })
}

/// Result of the negotiation handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub calibration: Option<FactoryCalibration>,
    pub body_color: Option<[u8; 3]>,
    /// Report mode the device was left in
    pub input_mode: u8,
}

/// Negotiation handshake.
///
/// Switches to Simple mode, reads both stick calibration blobs and the body
/// colour, then switches to Full mode. Calibration is read while reports
/// are still small so the reply match stays unambiguous. If calibration
/// cannot be read the device is left in Simple mode.
pub fn negotiate(channel: &mut CommandChannel) -> Result<Negotiated, ConnectionError> {
    channel.set_input_mode(REPORT_ID_SIMPLE)?;

    let calibration = match read_calibration(channel) {
        Ok(calibration) => Some(calibration),
        Err(e) => {
            warn!("Stick calibration unavailable, staying in Simple mode: {}", e);
            None
        }
    };

    let body_color = match channel.spi_read(SPI_BODY_COLOR, BODY_COLOR_LEN) {
        Ok(bytes) => <[u8; 3]>::try_from(bytes.as_slice()).ok(),
        Err(e) => {
            debug!("Body colour read failed: {}", e);
            None
        }
    };

    let input_mode = if calibration.is_some() {
        channel.set_input_mode(REPORT_ID_FULL)?;
        REPORT_ID_FULL
    } else {
        REPORT_ID_SIMPLE
    };

    Ok(Negotiated {
        calibration,
        body_color,
        input_mode,
    })
}

fn read_calibration(channel: &mut CommandChannel) -> Result<FactoryCalibration, ConnectionError> {
    let left = channel.spi_read(SPI_LEFT_STICK_CALIBRATION, STICK_CALIBRATION_LEN)?;
    let right = channel.spi_read(SPI_RIGHT_STICK_CALIBRATION, STICK_CALIBRATION_LEN)?;
    Ok(FactoryCalibration::from_blobs(&left, &right)?)
}

/// Handle to a running device session thread
pub struct DeviceSession {
    id: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

struct SessionContext {
    id: String,
    serial: String,
    hid: Arc<dyn HidBackend>,
    settings: SessionSettings,
    events: Sender<ControllerEvent>,
    stop: Arc<AtomicBool>,
}

impl DeviceSession {
    /// Spawn a session for `serial`, reported under transport id `id`.
    ///
    /// With `opened` the session skips Connecting and starts negotiating on
    /// the given handle.
    pub fn spawn(
        id: &str,
        serial: &str,
        hid: Arc<dyn HidBackend>,
        opened: Option<Box<dyn HidConnection>>,
        settings: SessionSettings,
        events: Sender<ControllerEvent>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let ctx = SessionContext {
            id: id.to_string(),
            serial: serial.to_string(),
            hid,
            settings,
            events,
            stop: Arc::clone(&stop),
        };

        let handle = thread::Builder::new()
            .name(format!("session-{}", id))
            .spawn(move || ctx.run(opened))?;

        Ok(Self {
            id: id.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the session to stop and wait for its thread.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Session {} panicked", self.id);
            }
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SessionContext {
    fn emit(&self, event: ControllerEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn set_state(&self, state: ConnectionState) -> bool {
        self.emit(ControllerEvent::StateChanged {
            id: self.id.clone(),
            state,
        })
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run(self, opened: Option<Box<dyn HidConnection>>) {
        let conn = match opened {
            Some(conn) => conn,
            None => {
                self.set_state(ConnectionState::Connecting);
                match open_device(self.hid.as_ref(), &self.serial, &self.settings.open_policy) {
                    Ok((_, conn)) => conn,
                    Err(e) => {
                        warn!("{}: {}", self.id, e);
                        self.set_state(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        };

        let mut channel = CommandChannel::new(
            conn,
            self.settings.reply_policy,
            self.settings.reply_timeout,
        );

        self.set_state(ConnectionState::Negotiating);
        let negotiated = match negotiate(&mut channel) {
            Ok(n) => {
                info!(
                    "{} negotiated (mode 0x{:02X}, calibration {})",
                    self.id,
                    n.input_mode,
                    if n.calibration.is_some() { "ok" } else { "missing" }
                );
                n
            }
            Err(e) => {
                warn!("{}: negotiation failed: {}", self.id, e);
                Negotiated {
                    calibration: None,
                    body_color: None,
                    input_mode: REPORT_ID_SIMPLE,
                }
            }
        };
        if !self.emit(ControllerEvent::Negotiated {
            id: self.id.clone(),
            calibration: negotiated.calibration,
            body_color: negotiated.body_color,
        }) {
            return;
        }

        if let Some(pattern) = self.settings.player_lights {
            if let Err(e) = channel.set_player_lights(pattern) {
                warn!("{}: player lights not set: {}", self.id, e);
            }
        }

        if !self.set_state(ConnectionState::Streaming) {
            return;
        }
        self.stream(&mut channel);
        self.set_state(ConnectionState::Disconnected);
        debug!("Session {} finished", self.id);
    }

    fn stream(&self, channel: &mut CommandChannel) {
        let mut buf = [0u8; REPORT_LEN];
        let wake = self.settings.read_wake;
        let mut failed_reads = 0usize;

        while !self.stopped() {
            match channel.read_frame(&mut buf, wake) {
                // Spurious wake or wake interval elapsed
                Ok(0) => continue,
                Ok(n) => {
                    if failed_reads > 0 {
                        debug!("{}: reads recovered after {} failure(s)", self.id, failed_reads);
                        failed_reads = 0;
                    }
                    trace!("{} RX {:02X?}", self.id, &buf[..n.min(12)]);
                    let event = ControllerEvent::Report {
                        id: self.id.clone(),
                        frame: buf[..n].to_vec(),
                    };
                    if !self.emit(event) {
                        break;
                    }
                }
                Err(BackendError::Closed) => {
                    info!("{}: transport closed", self.id);
                    break;
                }
                Err(e) => {
                    if failed_reads == 0 {
                        warn!("{}: read error: {}", self.id, e);
                    } else {
                        trace!("{}: read error: {}", self.id, e);
                    }
                    failed_reads += 1;
                    thread::sleep(wake);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockHidBackend;
    use crossbeam_channel::{unbounded, Receiver};
    use std::time::Instant;

    const LEFT_BLOB: [u8; 9] = [0xA0, 0x05, 0x4C, 0xD0, 0x07, 0x80, 0xB0, 0x05, 0x4E];
    const RIGHT_BLOB: [u8; 9] = [0x00, 0x08, 0x80, 0xB0, 0x05, 0x4E, 0xA0, 0x05, 0x4C];

    fn fast_settings() -> SessionSettings {
        SessionSettings {
            open_policy: RetryPolicy::immediate(3),
            reply_policy: RetryPolicy::immediate(4),
            reply_timeout: Duration::from_millis(1),
            read_wake: Duration::from_millis(5),
            player_lights: Some(0x01),
        }
    }

    fn calibrated_device(backend: &MockHidBackend, serial: &str) {
        backend.add_device(serial, JOYCON_LEFT_PRODUCT_ID);
        backend.set_flash(serial, SPI_LEFT_STICK_CALIBRATION, &LEFT_BLOB);
        backend.set_flash(serial, SPI_RIGHT_STICK_CALIBRATION, &RIGHT_BLOB);
        backend.set_flash(serial, SPI_BODY_COLOR, &[0x0A, 0xB9, 0xE6]);
    }

    fn wait_for(rx: &Receiver<ControllerEvent>, pred: impl Fn(&ControllerEvent) -> bool) -> ControllerEvent {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let event = rx.recv_timeout(left).expect("event not received in time");
            if pred(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_negotiation_order() {
        let backend = MockHidBackend::new();
        calibrated_device(&backend, "AA");
        let mut channel = CommandChannel::new(
            Box::new(backend.connect("AA")),
            RetryPolicy::immediate(4),
            Duration::from_millis(1),
        );

        let negotiated = negotiate(&mut channel).unwrap();
        assert_eq!(negotiated.input_mode, REPORT_ID_FULL);
        assert_eq!(negotiated.body_color, Some([0x0A, 0xB9, 0xE6]));
        assert_eq!(
            negotiated.calibration.unwrap().left,
            [0x5A0, 0x4C0, 0x7D0, 0x800, 0x5B0, 0x4E0]
        );

        let subcommands: Vec<(u8, u8)> = backend
            .writes("AA")
            .iter()
            .map(|w| (w[SUBCOMMAND_OFFSET], w[SUBCOMMAND_OFFSET + 1]))
            .collect();
        assert_eq!(
            subcommands,
            vec![
                (SUBCMD_SET_INPUT_MODE, REPORT_ID_SIMPLE),
                (SUBCMD_SPI_READ, 0x3D),
                (SUBCMD_SPI_READ, 0x46),
                (SUBCMD_SPI_READ, 0x50),
                (SUBCMD_SET_INPUT_MODE, REPORT_ID_FULL),
            ]
        );
        assert_eq!(backend.input_mode("AA"), Some(REPORT_ID_FULL));
    }

    #[test]
    fn test_open_device_gives_up() {
        let backend = MockHidBackend::new();
        let result = open_device(&backend, "missing", &RetryPolicy::immediate(3));
        assert!(matches!(
            result,
            Err(ConnectionError::DeviceNotFound { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_session_streams_reports_and_survives_read_errors() {
        let backend = MockHidBackend::new();
        calibrated_device(&backend, "AA");
        let (tx, rx) = unbounded();

        let mut session =
            DeviceSession::spawn("AA", "AA", Arc::new(backend.clone()), None, fast_settings(), tx).unwrap();

        let negotiated = wait_for(&rx, |e| matches!(e, ControllerEvent::Negotiated { .. }));
        let ControllerEvent::Negotiated { calibration, body_color, .. } = negotiated else {
            unreachable!()
        };
        assert!(calibration.is_some());
        assert_eq!(body_color, Some([0x0A, 0xB9, 0xE6]));
        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Streaming, .. })
        });
        assert_eq!(backend.player_lights("AA"), Some(0x01));

        backend.fail_reads("AA", 2);
        let mut frame = vec![0u8; REPORT_LEN];
        frame[0] = REPORT_ID_FULL;
        frame[1] = 0x77;
        backend.push_input("AA", &frame);

        let report = wait_for(&rx, |e| matches!(e, ControllerEvent::Report { frame, .. } if frame[1] == 0x77));
        assert!(matches!(report, ControllerEvent::Report { id, .. } if id == "AA"));

        session.stop();
        assert!(session.is_finished());
        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Disconnected, .. })
        });
    }

    #[test]
    fn test_session_ends_when_transport_closes() {
        let backend = MockHidBackend::new();
        calibrated_device(&backend, "AA");
        let (tx, rx) = unbounded();
        let session =
            DeviceSession::spawn("AA", "AA", Arc::new(backend.clone()), None, fast_settings(), tx).unwrap();
        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Streaming, .. })
        });

        backend.set_present("AA", false);
        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Disconnected, .. })
        });
        let deadline = Instant::now() + Duration::from_secs(2);
        while !session.is_finished() {
            assert!(Instant::now() < deadline, "session still running");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_session_reports_missing_device() {
        let backend = MockHidBackend::new();
        let (tx, rx) = unbounded();
        let _session =
            DeviceSession::spawn("ZZ", "ZZ", Arc::new(backend), None, fast_settings(), tx).unwrap();

        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Connecting, .. })
        });
        wait_for(&rx, |e| {
            matches!(e, ControllerEvent::StateChanged { state: ConnectionState::Disconnected, .. })
        });
    }
}
