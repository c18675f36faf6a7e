//! Virtual controller bound to one pad on the gamepad bus.

use crate::backend::{BackendError, VirtualPad};
use crate::gamepad::{GamepadState, XAxis, XButton, XTrigger};
use crate::joycon::Hand;
use log::trace;

/// One emulated Xbox 360 pad.
///
/// Each hand writes only its own slice of state; the published report is
/// the composition of both slices. A Pro Controller writes both slices,
/// a paired Joy-Con set writes one each.
pub struct VirtualController {
    index: usize,
    pad: Box<dyn VirtualPad>,
    connected: bool,
    left: GamepadState,
    right: GamepadState,
    published: Option<GamepadState>,
}

impl VirtualController {
    pub fn new(index: usize, pad: Box<dyn VirtualPad>) -> Self {
        Self {
            index,
            pad,
            connected: false,
            left: GamepadState::default(),
            right: GamepadState::default(),
            published: None,
        }
    }

    /// Slot of this pad in the registry
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Plug the pad into the bus. Idempotent.
    pub fn connect(&mut self) -> Result<(), BackendError> {
        if !self.connected {
            self.pad.connect()?;
            self.connected = true;
        }
        Ok(())
    }

    fn slice_mut(&mut self, hand: Hand) -> &mut GamepadState {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    pub fn set_button(&mut self, hand: Hand, button: XButton, pressed: bool) {
        self.slice_mut(hand).set_button(button, pressed);
    }

    pub fn set_axis(&mut self, hand: Hand, axis: XAxis, value: i16) {
        self.slice_mut(hand).set_axis(axis, value);
    }

    pub fn set_trigger(&mut self, hand: Hand, trigger: XTrigger, value: u8) {
        self.slice_mut(hand).set_trigger(trigger, value);
    }

    /// Composed state of both hands
    pub fn state(&self) -> GamepadState {
        self.left.merge(&self.right)
    }

    /// Publish the composed state if it changed since the last commit.
    pub fn commit(&mut self) -> Result<(), BackendError> {
        let state = self.state();
        if self.published == Some(state) {
            return Ok(());
        }
        trace!("Virtual pad #{} -> {:?}", self.index, state);
        self.pad.update(&state)?;
        self.published = Some(state);
        Ok(())
    }
}
