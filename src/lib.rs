//! joybridge: Joy-Con / Pro Controller to virtual Xbox 360 pad bridge
//!
//! This library talks to Nintendo Switch controllers over Bluetooth HID,
//! pairs lone left and right Joy-Cons into one virtual gamepad, and mirrors
//! their state onto virtual Xbox 360 pads.

pub mod backend;
pub mod gamepad;
pub mod joycon;
pub mod manager;
pub mod mapping;
pub mod registry;
pub mod retry;

// Re-export commonly used items
pub use backend::{GamepadBackend, HidBackend};
pub use gamepad::{GamepadState, VirtualController, XAxis, XButton, XTrigger};
pub use joycon::{ConnectionState, ControllerKind, Hand, InputReport};
pub use manager::{ControllerManager, ManagerError};
pub use mapping::{Config, ReportTranslator};
pub use registry::ControllerRegistry;
