//! Backend abstraction for the HID transport and the virtual gamepad bus
//!
//! This module provides a unified interface for talking to physical
//! controllers (raw HID frames) and for publishing virtual Xbox 360 pads
//! to the operating system.

pub mod hidapi_backend;
pub mod mock_gamepad;
pub mod mock_hid;
#[cfg(windows)]
pub mod vigem;

pub use hidapi_backend::HidapiBackend;
pub use mock_gamepad::MockGamepadBackend;
pub use mock_hid::MockHidBackend;
#[cfg(windows)]
pub use vigem::VigemBackend;

use crate::gamepad::GamepadState;
use std::ffi::CString;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Transport I/O failed: {0}")]
    Io(String),

    #[error("Transport closed")]
    Closed,

    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("Platform not supported")]
    PlatformNotSupported,
}

/// Enumerated HID device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform path used to open the device
    pub path: CString,
    /// Hardware serial (the Bluetooth address for wireless controllers)
    pub serial: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product: Option<String>,
}

/// Unified backend interface for HID enumeration
pub trait HidBackend: Send + Sync + 'static {
    /// List the currently attached Nintendo HID devices
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, BackendError>;

    /// Open a device returned by [`HidBackend::enumerate`]
    fn open(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn HidConnection>, BackendError>;
}

/// An open HID device
pub trait HidConnection: Send {
    /// Read one frame into `buf`, waiting at most `wake`.
    ///
    /// Returns `Ok(0)` when nothing arrived before the wake interval.
    fn read(&mut self, buf: &mut [u8], wake: Duration) -> Result<usize, BackendError>;

    /// Write one output frame
    fn write(&mut self, data: &[u8]) -> Result<usize, BackendError>;
}

/// Unified backend interface for the virtual gamepad bus
pub trait GamepadBackend: Send + Sync + 'static {
    /// Allocate a new (not yet plugged in) virtual Xbox 360 pad
    fn create_controller(&self) -> Result<Box<dyn VirtualPad>, BackendError>;
}

/// One virtual Xbox 360 pad
pub trait VirtualPad: Send {
    /// Plug the pad into the bus
    fn connect(&mut self) -> Result<(), BackendError>;

    /// Publish a full state report
    fn update(&mut self, state: &GamepadState) -> Result<(), BackendError>;
}

/// Get the default gamepad backend for the current platform
#[cfg(windows)]
pub fn get_gamepad_backend() -> Result<VigemBackend, BackendError> {
    VigemBackend::connect()
}

#[cfg(not(windows))]
pub fn get_gamepad_backend() -> Result<MockGamepadBackend, BackendError> {
    Err(BackendError::PlatformNotSupported)
}

/// Get a mock gamepad backend for testing
pub fn get_mock_gamepad_backend() -> MockGamepadBackend {
    MockGamepadBackend::new()
}
