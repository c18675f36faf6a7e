//! Mock gamepad backend for testing.
//!
//! This backend logs virtual pad reports instead of publishing them to the
//! OS, and remembers the last report of every pad so tests can inspect it.

use super::{BackendError, GamepadBackend, VirtualPad};
use crate::gamepad::GamepadState;
use log::{debug, info};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockPadRecord {
    connected: bool,
    updates: usize,
    last: Option<GamepadState>,
}

/// Mock gamepad backend that logs reports instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct MockGamepadBackend {
    pads: Arc<Mutex<Vec<MockPadRecord>>>,
}

impl MockGamepadBackend {
    /// Create a new mock gamepad backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pads created so far.
    pub fn created(&self) -> usize {
        self.pads.lock().map(|pads| pads.len()).unwrap_or(0)
    }

    /// Whether pad `index` has been plugged in.
    pub fn is_connected(&self, index: usize) -> bool {
        self.pads
            .lock()
            .ok()
            .and_then(|pads| pads.get(index).map(|p| p.connected))
            .unwrap_or(false)
    }

    /// Number of reports published by pad `index`.
    pub fn update_count(&self, index: usize) -> usize {
        self.pads
            .lock()
            .ok()
            .and_then(|pads| pads.get(index).map(|p| p.updates))
            .unwrap_or(0)
    }

    /// Last report published by pad `index`.
    pub fn last_report(&self, index: usize) -> Option<GamepadState> {
        self.pads
            .lock()
            .ok()
            .and_then(|pads| pads.get(index).and_then(|p| p.last))
    }
}

impl GamepadBackend for MockGamepadBackend {
    fn create_controller(&self) -> Result<Box<dyn VirtualPad>, BackendError> {
        let mut pads = self
            .pads
            .lock()
            .map_err(|_| BackendError::Operation("mock pad list poisoned".into()))?;
        pads.push(MockPadRecord::default());
        let index = pads.len() - 1;
        info!("[MOCK GAMEPAD] Created virtual pad #{}", index);
        Ok(Box::new(MockPad {
            index,
            pads: Arc::clone(&self.pads),
        }))
    }
}

struct MockPad {
    index: usize,
    pads: Arc<Mutex<Vec<MockPadRecord>>>,
}

impl MockPad {
    fn with_record(&self, f: impl FnOnce(&mut MockPadRecord)) -> Result<(), BackendError> {
        let mut pads = self
            .pads
            .lock()
            .map_err(|_| BackendError::Operation("mock pad list poisoned".into()))?;
        let record = pads
            .get_mut(self.index)
            .ok_or_else(|| BackendError::Operation(format!("mock pad #{} missing", self.index)))?;
        f(record);
        Ok(())
    }
}

impl VirtualPad for MockPad {
    fn connect(&mut self) -> Result<(), BackendError> {
        info!("[MOCK GAMEPAD] Pad #{} plugged in", self.index);
        self.with_record(|record| record.connected = true)
    }

    fn update(&mut self, state: &GamepadState) -> Result<(), BackendError> {
        debug!("[MOCK GAMEPAD] Pad #{} report: {:?}", self.index, state);
        self.with_record(|record| {
            record.updates += 1;
            record.last = Some(*state);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamepad::XButton;

    #[test]
    fn mock_gamepad_records_reports() {
        let backend = MockGamepadBackend::new();
        let mut pad = backend.create_controller().unwrap();
        assert_eq!(backend.created(), 1);
        assert!(!backend.is_connected(0));

        pad.connect().unwrap();
        assert!(backend.is_connected(0));

        let mut state = GamepadState::default();
        state.set_button(XButton::A, true);
        pad.update(&state).unwrap();

        assert_eq!(backend.update_count(0), 1);
        assert!(backend.last_report(0).unwrap().button(XButton::A));
        assert!(backend.last_report(1).is_none());
    }
}
