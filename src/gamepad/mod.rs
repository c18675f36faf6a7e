//! Virtual Xbox 360 gamepad model
//!
//! Buttons, axes and triggers as the consuming software sees them, plus the
//! `VirtualController` that owns one pad on the bus.

pub mod controller;

pub use controller::VirtualController;

/// Digital buttons of an Xbox 360 pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XButton {
    Up,
    Down,
    Left,
    Right,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    Guide,
    A,
    B,
    X,
    Y,
}

impl XButton {
    /// XUSB report bit of this button
    pub fn mask(self) -> u16 {
        match self {
            XButton::Up => 0x0001,
            XButton::Down => 0x0002,
            XButton::Left => 0x0004,
            XButton::Right => 0x0008,
            XButton::Start => 0x0010,
            XButton::Back => 0x0020,
            XButton::LeftThumb => 0x0040,
            XButton::RightThumb => 0x0080,
            XButton::LeftShoulder => 0x0100,
            XButton::RightShoulder => 0x0200,
            XButton::Guide => 0x0400,
            XButton::A => 0x1000,
            XButton::B => 0x2000,
            XButton::X => 0x4000,
            XButton::Y => 0x8000,
        }
    }
}

/// Thumbstick axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XAxis {
    LeftThumbX,
    LeftThumbY,
    RightThumbX,
    RightThumbY,
}

/// Analog triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XTrigger {
    Left,
    Right,
}

/// Trigger value of a fully pressed digital ZL/ZR
pub const TRIGGER_PRESSED: u8 = 0xFF;

/// Full state of one virtual pad
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadState {
    buttons: u16,
    axes: [i16; 4],
    triggers: [u8; 2],
}

impl GamepadState {
    pub fn button(&self, button: XButton) -> bool {
        self.buttons & button.mask() != 0
    }

    pub fn set_button(&mut self, button: XButton, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }

    /// Raw XUSB button mask
    pub fn buttons(&self) -> u16 {
        self.buttons
    }

    pub fn axis(&self, axis: XAxis) -> i16 {
        self.axes[axis_slot(axis)]
    }

    pub fn set_axis(&mut self, axis: XAxis, value: i16) {
        self.axes[axis_slot(axis)] = value;
    }

    pub fn trigger(&self, trigger: XTrigger) -> u8 {
        self.triggers[trigger_slot(trigger)]
    }

    pub fn set_trigger(&mut self, trigger: XTrigger, value: u8) {
        self.triggers[trigger_slot(trigger)] = value;
    }

    /// Overlay `other` on top of `self`: buttons are OR-ed, axes and
    /// triggers are taken from `other` when non-neutral.
    pub fn merge(&self, other: &GamepadState) -> GamepadState {
        let mut merged = *self;
        merged.buttons |= other.buttons;
        for (slot, value) in merged.axes.iter_mut().zip(other.axes) {
            if value != 0 {
                *slot = value;
            }
        }
        for (slot, value) in merged.triggers.iter_mut().zip(other.triggers) {
            *slot = (*slot).max(value);
        }
        merged
    }
}

fn axis_slot(axis: XAxis) -> usize {
    match axis {
        XAxis::LeftThumbX => 0,
        XAxis::LeftThumbY => 1,
        XAxis::RightThumbX => 2,
        XAxis::RightThumbY => 3,
    }
}

fn trigger_slot(trigger: XTrigger) -> usize {
    match trigger {
        XTrigger::Left => 0,
        XTrigger::Right => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_set_and_clear() {
        let mut state = GamepadState::default();
        state.set_button(XButton::Guide, true);
        state.set_button(XButton::Y, true);
        assert_eq!(state.buttons(), 0x8400);
        state.set_button(XButton::Guide, false);
        assert!(!state.button(XButton::Guide));
        assert!(state.button(XButton::Y));
    }

    #[test]
    fn test_merge_keeps_each_hands_fields() {
        let mut left = GamepadState::default();
        left.set_button(XButton::Left, true);
        left.set_axis(XAxis::LeftThumbX, -32767);
        left.set_trigger(XTrigger::Left, TRIGGER_PRESSED);

        let mut right = GamepadState::default();
        right.set_button(XButton::A, true);
        right.set_axis(XAxis::RightThumbY, 1200);

        let merged = left.merge(&right);
        assert!(merged.button(XButton::Left));
        assert!(merged.button(XButton::A));
        assert_eq!(merged.axis(XAxis::LeftThumbX), -32767);
        assert_eq!(merged.axis(XAxis::RightThumbY), 1200);
        assert_eq!(merged.trigger(XTrigger::Left), TRIGGER_PRESSED);
        assert_eq!(merged.trigger(XTrigger::Right), 0);
    }
}
