//! Report translator
//!
//! Applies decoded input reports to a virtual pad. Each hand only writes
//! its own slice of the pad, so a Joy-Con pair sharing one pad never
//! overwrites the other half's buttons or stick.

use crate::gamepad::{VirtualController, XAxis, XButton, XTrigger, TRIGGER_PRESSED};
use crate::joycon::calibration::{scale_to_axis, CalibrationCache, CalibrationError, StickCalibration};
use crate::joycon::report::{FullReport, SimpleReport};
use crate::joycon::{ControllerKind, FactoryCalibration, Hand, InputReport};
use log::debug;

const AXIS_MAX: i16 = i16::MAX;

/// Stick axes for hat values 0-8 of a left Joy-Con held sideways
const LEFT_HAT: [(i16, i16); 9] = [
    (AXIS_MAX, 0),
    (AXIS_MAX, -AXIS_MAX),
    (0, -AXIS_MAX),
    (-AXIS_MAX, -AXIS_MAX),
    (-AXIS_MAX, 0),
    (-AXIS_MAX, AXIS_MAX),
    (0, AXIS_MAX),
    (AXIS_MAX, AXIS_MAX),
    (0, 0),
];

/// Mirror of [`LEFT_HAT`] for the right Joy-Con
const RIGHT_HAT: [(i16, i16); 9] = [
    (-AXIS_MAX, 0),
    (-AXIS_MAX, AXIS_MAX),
    (0, AXIS_MAX),
    (AXIS_MAX, AXIS_MAX),
    (AXIS_MAX, 0),
    (AXIS_MAX, -AXIS_MAX),
    (0, -AXIS_MAX),
    (-AXIS_MAX, -AXIS_MAX),
    (0, 0),
];

// Simple mode, left Joy-Con
const SIMPLE_LEFT_BYTE1: [(u8, XButton); 4] = [
    (0x01, XButton::Left),
    (0x02, XButton::Down),
    (0x04, XButton::Up),
    (0x08, XButton::Right),
];
const SIMPLE_LEFT_BYTE2: [(u8, XButton); 4] = [
    (0x01, XButton::Back),
    (0x04, XButton::LeftThumb),
    (0x20, XButton::Guide),
    (0x40, XButton::LeftShoulder),
];

// Simple mode, right Joy-Con
const SIMPLE_RIGHT_BYTE1: [(u8, XButton); 4] = [
    (0x01, XButton::A),
    (0x02, XButton::X),
    (0x04, XButton::B),
    (0x08, XButton::Y),
];
const SIMPLE_RIGHT_BYTE2: [(u8, XButton); 4] = [
    (0x02, XButton::Start),
    (0x08, XButton::RightThumb),
    (0x10, XButton::Guide),
    (0x40, XButton::RightShoulder),
];

/// ZL / ZR bit in both modes
const TRIGGER_BIT: u8 = 0x80;

// Full mode
const FULL_RIGHT: [(u8, XButton); 5] = [
    (0x01, XButton::Y),
    (0x02, XButton::X),
    (0x04, XButton::B),
    (0x08, XButton::A),
    (0x40, XButton::RightShoulder),
];
const FULL_SHARED_RIGHT: [(u8, XButton); 3] = [
    (0x02, XButton::Start),
    (0x04, XButton::RightThumb),
    (0x10, XButton::Guide),
];
const FULL_SHARED_LEFT: [(u8, XButton); 3] = [
    (0x01, XButton::Back),
    (0x08, XButton::LeftThumb),
    (0x20, XButton::Guide),
];
const FULL_LEFT: [(u8, XButton); 5] = [
    (0x01, XButton::Down),
    (0x02, XButton::Up),
    (0x04, XButton::Right),
    (0x08, XButton::Left),
    (0x40, XButton::LeftShoulder),
];

fn apply_mask(pad: &mut VirtualController, hand: Hand, byte: u8, table: &[(u8, XButton)]) {
    for (bit, button) in table {
        pad.set_button(hand, *button, byte & bit != 0);
    }
}

fn trigger_value(byte: u8) -> u8 {
    if byte & TRIGGER_BIT != 0 {
        TRIGGER_PRESSED
    } else {
        0
    }
}

fn hand_axes(hand: Hand) -> (XAxis, XAxis) {
    match hand {
        Hand::Left => (XAxis::LeftThumbX, XAxis::LeftThumbY),
        Hand::Right => (XAxis::RightThumbX, XAxis::RightThumbY),
    }
}

fn hand_trigger(hand: Hand) -> XTrigger {
    match hand {
        Hand::Left => XTrigger::Left,
        Hand::Right => XTrigger::Right,
    }
}

/// Translates decoded reports into virtual pad updates.
pub struct ReportTranslator {
    calibration: CalibrationCache,
    deadzone: f32,
}

impl ReportTranslator {
    pub fn new(deadzone: f32) -> Self {
        Self {
            calibration: CalibrationCache::new(),
            deadzone,
        }
    }

    /// Drop cached calibration for a device, e.g. after it renegotiated.
    pub fn forget(&self, id: &str) {
        self.calibration.invalidate(id);
    }

    /// Apply one report from device `id` to its pad.
    ///
    /// Full-mode reports need calibration: the cached entry, or `raw` to
    /// populate it. Nothing is written when it is unavailable.
    pub fn apply(
        &self,
        id: &str,
        kind: ControllerKind,
        report: &InputReport,
        raw: Option<&FactoryCalibration>,
        pad: &mut VirtualController,
    ) -> Result<(), CalibrationError> {
        match report {
            InputReport::Simple(simple) => {
                self.apply_simple(kind, simple, pad);
                Ok(())
            }
            InputReport::Full(full) => {
                let calibration = self.calibration.resolve(id, raw)?;
                for hand in kind.hands() {
                    let stick = match hand {
                        Hand::Left => &calibration.left,
                        Hand::Right => &calibration.right,
                    };
                    self.apply_full(*hand, full, stick, pad);
                }
                Ok(())
            }
        }
    }

    fn apply_simple(&self, kind: ControllerKind, report: &SimpleReport, pad: &mut VirtualController) {
        let Some(hand) = kind.hand() else {
            debug!("Simple report from {} ignored", kind);
            return;
        };
        let (byte1_table, byte2_table, hat_table) = match hand {
            Hand::Left => (&SIMPLE_LEFT_BYTE1, &SIMPLE_LEFT_BYTE2, &LEFT_HAT),
            Hand::Right => (&SIMPLE_RIGHT_BYTE1, &SIMPLE_RIGHT_BYTE2, &RIGHT_HAT),
        };

        apply_mask(pad, hand, report.buttons[0], byte1_table);
        apply_mask(pad, hand, report.buttons[1], byte2_table);
        pad.set_trigger(hand, hand_trigger(hand), trigger_value(report.buttons[1]));

        if let Some((x, y)) = hat_table.get(report.hat as usize) {
            let (x_axis, y_axis) = hand_axes(hand);
            pad.set_axis(hand, x_axis, *x);
            pad.set_axis(hand, y_axis, *y);
        }
    }

    fn apply_full(&self, hand: Hand, report: &FullReport, stick: &StickCalibration, pad: &mut VirtualController) {
        let [right, shared, left] = report.buttons;
        let (own, own_table, shared_table, raw_stick) = match hand {
            Hand::Left => (left, &FULL_LEFT, &FULL_SHARED_LEFT, report.left_stick),
            Hand::Right => (right, &FULL_RIGHT, &FULL_SHARED_RIGHT, report.right_stick),
        };

        apply_mask(pad, hand, own, own_table);
        apply_mask(pad, hand, shared, shared_table);
        pad.set_trigger(hand, hand_trigger(hand), trigger_value(own));

        let (x, y) = stick.normalize(raw_stick);
        let (x_axis, y_axis) = hand_axes(hand);
        pad.set_axis(hand, x_axis, scale_to_axis(x, self.deadzone));
        pad.set_axis(hand, y_axis, scale_to_axis(y, self.deadzone));
    }
}
