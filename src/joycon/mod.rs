//! Joy-Con and Pro Controller support
//!
//! This module provides the device-facing half of the bridge:
//! - HID connection, negotiation and the per-device read loop
//! - Output command frames and sub-command replies
//! - Input report decoding and stick calibration
//! - Known controller cache

pub mod battery;
pub mod calibration;
pub mod codec;
pub mod colors;
pub mod command;
pub mod connection;
pub mod constants;
pub mod device_cache;
pub mod report;
pub mod types;

// Re-export commonly used items
pub use battery::{BatteryCharge, BatteryLevel};
pub use calibration::{CalibrationCache, CalibrationError, FactoryCalibration, StickCalibration};
pub use codec::CodecError;
pub use command::{CommandChannel, CommandError};
pub use connection::{ConnectionError, ConnectionState, ControllerEvent, DeviceSession, SessionSettings};
pub use device_cache::ControllerCache;
pub use report::{FullReport, InputReport, ReportError, SimpleReport};
pub use types::*;
