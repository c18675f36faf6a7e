//! Mock HID backend for testing.
//!
//! Emulates enough of a Joy-Con to drive the command channel and the
//! negotiation sequence without hardware: sub-commands written to a device
//! are answered with a 0x21 reply echoing the sub-command id, SPI reads
//! are served from a per-device flash map, and tests can inject input
//! frames that the read loop will pick up.

use super::{BackendError, DeviceDescriptor, HidBackend, HidConnection};
use crate::joycon::constants::*;
use log::{debug, info};
use std::collections::{HashMap, VecDeque};
use std::ffi::CString;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Longest time a mock read sleeps when its inbox is empty
const IDLE_READ_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Default)]
struct MockDevice {
    serial: String,
    product_id: u16,
    present: bool,
    flash: HashMap<u32, Vec<u8>>,
    inbox: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    open_count: usize,
    pending_read_errors: usize,
    mute_replies: bool,
    input_mode: Option<u8>,
    player_lights: Option<u8>,
    timer: u8,
}

impl MockDevice {
    fn subcommand_reply(&mut self, subcommand: u8, args: &[u8]) -> Vec<u8> {
        let mut reply = vec![0u8; REPORT_LEN];
        self.timer = self.timer.wrapping_add(1);
        reply[0] = REPORT_ID_SUBCOMMAND_REPLY;
        reply[1] = self.timer;
        // Neutral sticks
        reply[6..9].copy_from_slice(&[0x00, 0x08, 0x80]);
        reply[9..12].copy_from_slice(&[0x00, 0x08, 0x80]);
        reply[13] = 0x80;
        reply[REPLY_SUBCOMMAND_OFFSET] = subcommand;

        match subcommand {
            SUBCMD_SPI_READ if args.len() >= 5 => {
                let address = u32::from_le_bytes([args[0], args[1], args[2], args[3]]);
                let len = args[4] as usize;
                reply[13] = 0x90;
                reply[15..20].copy_from_slice(&args[..5]);
                let data = self.flash.get(&address).cloned().unwrap_or_default();
                let end = (REPLY_SPI_DATA_OFFSET + len).min(REPORT_LEN);
                for (slot, byte) in reply[REPLY_SPI_DATA_OFFSET..end]
                    .iter_mut()
                    .zip(data.iter().chain(std::iter::repeat(&0)))
                {
                    *slot = *byte;
                }
            }
            SUBCMD_SET_INPUT_MODE => self.input_mode = args.first().copied(),
            SUBCMD_SET_PLAYER_LIGHTS => self.player_lights = args.first().copied(),
            _ => {}
        }
        reply
    }
}

/// Mock HID backend with scripted devices.
#[derive(Clone, Debug, Default)]
pub struct MockHidBackend {
    devices: Arc<Mutex<Vec<MockDevice>>>,
}

impl MockHidBackend {
    /// Create a new mock backend with no devices attached.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<MockDevice>>, BackendError> {
        self.devices
            .lock()
            .map_err(|_| BackendError::Operation("mock device list poisoned".into()))
    }

    fn with_device<T>(&self, serial: &str, f: impl FnOnce(&mut MockDevice) -> T) -> Option<T> {
        let mut devices = self.lock().ok()?;
        devices.iter_mut().find(|d| d.serial == serial).map(f)
    }

    /// Attach a device with the given serial and product id.
    pub fn add_device(&self, serial: &str, product_id: u16) {
        if let Ok(mut devices) = self.lock() {
            info!("[MOCK HID] Attached {} (product 0x{:04X})", serial, product_id);
            devices.push(MockDevice {
                serial: serial.to_string(),
                product_id,
                present: true,
                ..MockDevice::default()
            });
        }
    }

    /// Store `bytes` at SPI flash `address`.
    pub fn set_flash(&self, serial: &str, address: u32, bytes: &[u8]) {
        self.with_device(serial, |d| d.flash.insert(address, bytes.to_vec()));
    }

    /// Make a device appear in or vanish from enumeration.
    pub fn set_present(&self, serial: &str, present: bool) {
        self.with_device(serial, |d| d.present = present);
    }

    /// Queue an input frame for the device's read loop.
    pub fn push_input(&self, serial: &str, frame: &[u8]) {
        self.with_device(serial, |d| d.inbox.push_back(frame.to_vec()));
    }

    /// Make the next `count` reads fail with an I/O error.
    pub fn fail_reads(&self, serial: &str, count: usize) {
        self.with_device(serial, |d| d.pending_read_errors = count);
    }

    /// Stop answering sub-commands.
    pub fn mute_replies(&self, serial: &str, mute: bool) {
        self.with_device(serial, |d| d.mute_replies = mute);
    }

    /// Every frame written to the device so far.
    pub fn writes(&self, serial: &str) -> Vec<Vec<u8>> {
        self.with_device(serial, |d| d.writes.clone()).unwrap_or_default()
    }

    /// Number of times the device was opened.
    pub fn open_count(&self, serial: &str) -> usize {
        self.with_device(serial, |d| d.open_count).unwrap_or(0)
    }

    /// Last input report mode requested through sub-command 0x03.
    pub fn input_mode(&self, serial: &str) -> Option<u8> {
        self.with_device(serial, |d| d.input_mode).flatten()
    }

    /// Last player lights pattern requested through sub-command 0x30.
    pub fn player_lights(&self, serial: &str) -> Option<u8> {
        self.with_device(serial, |d| d.player_lights).flatten()
    }

    /// Open a connection directly, bypassing enumeration.
    pub fn connect(&self, serial: &str) -> MockHidConnection {
        MockHidConnection {
            backend: self.clone(),
            serial: serial.to_string(),
        }
    }
}

fn mock_path(serial: &str) -> CString {
    CString::new(format!("mock://{}", serial)).unwrap_or_default()
}

impl HidBackend for MockHidBackend {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        let devices = self.lock()?;
        Ok(devices
            .iter()
            .filter(|d| d.present)
            .map(|d| DeviceDescriptor {
                path: mock_path(&d.serial),
                serial: d.serial.clone(),
                vendor_id: NINTENDO_VENDOR_ID,
                product_id: d.product_id,
                product: Some("Mock Controller".to_string()),
            })
            .collect())
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn HidConnection>, BackendError> {
        let mut devices = self.lock()?;
        let device = devices
            .iter_mut()
            .find(|d| d.present && mock_path(&d.serial) == descriptor.path)
            .ok_or_else(|| BackendError::Io(format!("{} not present", descriptor.serial)))?;
        device.open_count += 1;
        debug!("[MOCK HID] Opened {}", device.serial);
        Ok(Box::new(self.connect(&descriptor.serial)))
    }
}

/// Open handle to a mock device.
pub struct MockHidConnection {
    backend: MockHidBackend,
    serial: String,
}

impl HidConnection for MockHidConnection {
    fn read(&mut self, buf: &mut [u8], wake: Duration) -> Result<usize, BackendError> {
        let frame = {
            let mut devices = self.backend.lock()?;
            let device = devices
                .iter_mut()
                .find(|d| d.serial == self.serial)
                .ok_or(BackendError::Closed)?;
            if !device.present {
                return Err(BackendError::Closed);
            }
            if device.pending_read_errors > 0 {
                device.pending_read_errors -= 1;
                return Err(BackendError::Io("simulated read failure".into()));
            }
            device.inbox.pop_front()
        };

        match frame {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            None => {
                thread::sleep(wake.min(IDLE_READ_SLEEP));
                Ok(0)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        let mut devices = self.backend.lock()?;
        let device = devices
            .iter_mut()
            .find(|d| d.serial == self.serial)
            .ok_or(BackendError::Closed)?;
        if !device.present {
            return Err(BackendError::Closed);
        }
        device.writes.push(data.to_vec());

        if data.first() == Some(&CMD_RUMBLE_AND_SUBCOMMAND) && !device.mute_replies {
            if let Some(&subcommand) = data.get(SUBCOMMAND_OFFSET) {
                let args = data.get(SUBCOMMAND_OFFSET + 1..).unwrap_or(&[]);
                let reply = device.subcommand_reply(subcommand, args);
                device.inbox.push_back(reply);
            }
        }
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_hid_answers_spi_reads() {
        let backend = MockHidBackend::new();
        backend.add_device("AA", JOYCON_LEFT_PRODUCT_ID);
        backend.set_flash("AA", 0x6050, &[0x0A, 0xB9, 0xE6]);

        let mut conn = backend.connect("AA");
        let mut frame = vec![0u8; REPORT_LEN];
        frame[0] = CMD_RUMBLE_AND_SUBCOMMAND;
        frame[SUBCOMMAND_OFFSET] = SUBCMD_SPI_READ;
        frame[11..16].copy_from_slice(&[0x50, 0x60, 0x00, 0x00, 0x03]);
        conn.write(&frame).unwrap();

        let mut buf = [0u8; REPORT_LEN];
        let n = conn.read(&mut buf, Duration::from_millis(1)).unwrap();
        assert_eq!(n, REPORT_LEN);
        assert_eq!(buf[0], REPORT_ID_SUBCOMMAND_REPLY);
        assert_eq!(buf[REPLY_SUBCOMMAND_OFFSET], SUBCMD_SPI_READ);
        assert_eq!(&buf[20..23], &[0x0A, 0xB9, 0xE6]);
    }

    #[test]
    fn mock_hid_hides_absent_devices() {
        let backend = MockHidBackend::new();
        backend.add_device("AA", JOYCON_LEFT_PRODUCT_ID);
        backend.add_device("BB", JOYCON_RIGHT_PRODUCT_ID);
        backend.set_present("AA", false);

        let listed = backend.enumerate().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].serial, "BB");
    }

    #[test]
    fn mock_hid_empty_read_returns_zero() {
        let backend = MockHidBackend::new();
        backend.add_device("AA", JOYCON_LEFT_PRODUCT_ID);
        let mut conn = backend.connect("AA");
        let mut buf = [0u8; REPORT_LEN];
        assert_eq!(conn.read(&mut buf, Duration::from_millis(1)).unwrap(), 0);
    }
}
