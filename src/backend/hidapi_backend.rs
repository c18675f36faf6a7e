//! HID transport backed by the `hidapi` crate.

use super::{BackendError, DeviceDescriptor, HidBackend, HidConnection};
use crate::joycon::constants::NINTENDO_VENDOR_ID;
use hidapi::{HidApi, HidDevice, HidError};
use log::debug;
use std::sync::Mutex;
use std::time::Duration;

/// HID backend over the platform hidapi library.
pub struct HidapiBackend {
    api: Mutex<HidApi>,
}

impl HidapiBackend {
    /// Initialise hidapi.
    pub fn new() -> Result<Self, BackendError> {
        let api = HidApi::new().map_err(to_backend_error)?;
        Ok(Self { api: Mutex::new(api) })
    }
}

impl HidBackend for HidapiBackend {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        let mut api = self
            .api
            .lock()
            .map_err(|_| BackendError::Operation("hidapi lock poisoned".into()))?;
        api.refresh_devices().map_err(to_backend_error)?;

        let devices: Vec<DeviceDescriptor> = api
            .device_list()
            .filter(|info| info.vendor_id() == NINTENDO_VENDOR_ID)
            .map(|info| DeviceDescriptor {
                path: info.path().to_owned(),
                serial: info.serial_number().unwrap_or_default().to_string(),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                product: info.product_string().map(str::to_string),
            })
            .collect();

        debug!("Enumerated {} Nintendo HID devices", devices.len());
        Ok(devices)
    }

    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn HidConnection>, BackendError> {
        let api = self
            .api
            .lock()
            .map_err(|_| BackendError::Operation("hidapi lock poisoned".into()))?;
        let device = api.open_path(&descriptor.path).map_err(to_backend_error)?;
        // Blocking mode; reads still honour the timeout passed to read_timeout
        device.set_blocking_mode(true).map_err(to_backend_error)?;
        Ok(Box::new(HidapiConnection { device }))
    }
}

struct HidapiConnection {
    device: HidDevice,
}

impl HidConnection for HidapiConnection {
    fn read(&mut self, buf: &mut [u8], wake: Duration) -> Result<usize, BackendError> {
        let millis = i32::try_from(wake.as_millis()).unwrap_or(i32::MAX);
        self.device.read_timeout(buf, millis).map_err(to_backend_error)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BackendError> {
        self.device.write(data).map_err(to_backend_error)
    }
}

/// Error texts the platform hidapi backends report once a device is gone
const DEVICE_GONE_MARKERS: [&str; 3] = ["not connected", "no such device", "disconnected"];

fn to_backend_error(e: HidError) -> BackendError {
    classify_error(e.to_string())
}

fn classify_error(message: String) -> BackendError {
    let lower = message.to_lowercase();
    if DEVICE_GONE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        BackendError::Closed
    } else {
        BackendError::Io(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_gone_maps_to_closed() {
        let windows = "ReadFile: (0x0000048F) The device is not connected.".to_string();
        assert!(matches!(classify_error(windows), BackendError::Closed));
        assert!(matches!(classify_error("hidraw: No such device".into()), BackendError::Closed));
        assert!(matches!(
            classify_error("hid_write: timed out".into()),
            BackendError::Io(msg) if msg == "hid_write: timed out"
        ));
    }
}
