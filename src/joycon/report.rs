//! Input report decoding
//!
//! A raw frame is decoded once, at the boundary, into [`InputReport`].
//!
//! Simple mode (0x3F):
//!
//! | Offset | Field                      |
//! |--------|----------------------------|
//! | 1      | button mask 1              |
//! | 2      | button mask 2              |
//! | 3      | stick hat (0-7, 8 = idle)  |
//!
//! Full mode (0x30):
//!
//! | Offset | Field                                   |
//! |--------|-----------------------------------------|
//! | 1      | timer                                   |
//! | 2      | battery (high nibble), connection info  |
//! | 3..6   | buttons: right, shared, left            |
//! | 6..9   | left stick sample                       |
//! | 9..12  | right stick sample                      |

use crate::joycon::battery::BatteryLevel;
use crate::joycon::codec::decode_stick_sample;
use crate::joycon::constants::{REPORT_ID_FULL, REPORT_ID_SIMPLE};
use thiserror::Error;

/// Hat value of a centered stick in Simple mode
pub const HAT_CENTERED: u8 = 8;

const SIMPLE_REPORT_LEN: usize = 4;
const FULL_REPORT_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("Unknown report id 0x{0:02X}")]
    UnknownReportId(u8),

    #[error("Report 0x{id:02X} too short: {len} bytes, need {need}")]
    TooShort { id: u8, len: usize, need: usize },

    #[error("Empty report")]
    Empty,
}

/// Simple HID mode report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleReport {
    pub buttons: [u8; 2],
    pub hat: u8,
}

/// Full (standard) mode report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullReport {
    pub timer: u8,
    pub battery: BatteryLevel,
    /// Right-hand, shared and left-hand button masks in that order
    pub buttons: [u8; 3],
    pub left_stick: (u16, u16),
    pub right_stick: (u16, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputReport {
    Simple(SimpleReport),
    Full(FullReport),
}

impl InputReport {
    pub fn parse(frame: &[u8]) -> Result<Self, ReportError> {
        let id = *frame.first().ok_or(ReportError::Empty)?;
        let need = match id {
            REPORT_ID_SIMPLE => SIMPLE_REPORT_LEN,
            REPORT_ID_FULL => FULL_REPORT_LEN,
            other => return Err(ReportError::UnknownReportId(other)),
        };
        if frame.len() < need {
            return Err(ReportError::TooShort {
                id,
                len: frame.len(),
                need,
            });
        }

        if id == REPORT_ID_SIMPLE {
            return Ok(InputReport::Simple(SimpleReport {
                buttons: [frame[1], frame[2]],
                hat: frame[3],
            }));
        }

        Ok(InputReport::Full(FullReport {
            timer: frame[1],
            battery: BatteryLevel::from_nibble(frame[2] >> 4),
            buttons: [frame[3], frame[4], frame[5]],
            left_stick: decode_stick_sample([frame[6], frame[7], frame[8]]),
            right_stick: decode_stick_sample([frame[9], frame[10], frame[11]]),
        }))
    }

    pub fn report_id(&self) -> u8 {
        match self {
            InputReport::Simple(_) => REPORT_ID_SIMPLE,
            InputReport::Full(_) => REPORT_ID_FULL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joycon::battery::BatteryCharge;

    #[test]
    fn test_parse_simple() {
        let report = InputReport::parse(&[0x3F, 0x01, 0x40, 0x08, 0x00]).unwrap();
        assert_eq!(
            report,
            InputReport::Simple(SimpleReport {
                buttons: [0x01, 0x40],
                hat: HAT_CENTERED,
            })
        );
    }

    #[test]
    fn test_parse_full() {
        let mut frame = [0u8; 64];
        frame[0] = 0x30;
        frame[1] = 0x42;
        frame[2] = 0x91;
        frame[3] = 0x08;
        frame[5] = 0x80;
        frame[6..9].copy_from_slice(&[0x00, 0x08, 0x80]);
        frame[9..12].copy_from_slice(&[0xFF, 0xF7, 0x7F]);

        let InputReport::Full(full) = InputReport::parse(&frame).unwrap() else {
            panic!("expected a full report");
        };
        assert_eq!(full.timer, 0x42);
        assert_eq!(full.battery.charge, BatteryCharge::Full);
        assert!(full.battery.charging);
        assert_eq!(full.buttons, [0x08, 0x00, 0x80]);
        assert_eq!(full.left_stick, (0x800, 0x800));
        assert_eq!(full.right_stick, (0x7FF, 0x7FF));
    }

    #[test]
    fn test_unknown_and_short_frames() {
        assert_eq!(
            InputReport::parse(&[0x21, 0, 0, 0]),
            Err(ReportError::UnknownReportId(0x21))
        );
        assert_eq!(
            InputReport::parse(&[0x30, 0, 0]),
            Err(ReportError::TooShort { id: 0x30, len: 3, need: 12 })
        );
        assert_eq!(InputReport::parse(&[]), Err(ReportError::Empty));
    }
}
