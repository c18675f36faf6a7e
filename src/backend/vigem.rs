//! ViGEmBus virtual Xbox 360 backend (Windows only).
//!
//! Each virtual pad is an `Xbox360Wired` target sharing one bus client.

use super::{BackendError, GamepadBackend, VirtualPad};
use crate::gamepad::{GamepadState, XAxis, XTrigger};
use log::info;
use std::sync::Arc;
use vigem_client::{Client, TargetId, XButtons, XGamepad, Xbox360Wired};

/// Virtual gamepad backend over the ViGEmBus driver.
pub struct VigemBackend {
    client: Arc<Client>,
}

impl VigemBackend {
    /// Connect to the ViGEmBus driver.
    pub fn connect() -> Result<Self, BackendError> {
        let client = Client::connect()
            .map_err(|e| BackendError::Operation(format!("ViGEmBus unavailable: {:?}", e)))?;
        info!("Connected to ViGEmBus");
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

impl GamepadBackend for VigemBackend {
    fn create_controller(&self) -> Result<Box<dyn VirtualPad>, BackendError> {
        let target = Xbox360Wired::new(Arc::clone(&self.client), TargetId::XBOX360_WIRED);
        Ok(Box::new(VigemPad { target }))
    }
}

struct VigemPad {
    target: Xbox360Wired<Arc<Client>>,
}

impl VirtualPad for VigemPad {
    fn connect(&mut self) -> Result<(), BackendError> {
        self.target
            .plugin()
            .map_err(|e| BackendError::Operation(format!("plugin failed: {:?}", e)))?;
        self.target
            .wait_ready()
            .map_err(|e| BackendError::Operation(format!("target not ready: {:?}", e)))
    }

    fn update(&mut self, state: &GamepadState) -> Result<(), BackendError> {
        let report = XGamepad {
            buttons: XButtons { raw: state.buttons() },
            left_trigger: state.trigger(XTrigger::Left),
            right_trigger: state.trigger(XTrigger::Right),
            thumb_lx: state.axis(XAxis::LeftThumbX),
            thumb_ly: state.axis(XAxis::LeftThumbY),
            thumb_rx: state.axis(XAxis::RightThumbX),
            thumb_ry: state.axis(XAxis::RightThumbY),
        };
        self.target
            .update(&report)
            .map_err(|e| BackendError::Operation(format!("report rejected: {:?}", e)))
    }
}
