//! Joy-Con type definitions
//!
//! This module defines the basic data types used throughout the joycon
//! module: controller kinds and the hand a device (or half of a device)
//! belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::joycon::constants::*;

/// Which half of a gamepad an input belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

/// Hardware variant of a physical controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    JoyConLeft,
    JoyConRight,
    ProController,
}

impl ControllerKind {
    /// Derive the kind from a HID product id. Unknown ids yield `None`.
    pub fn from_product_id(product_id: u16) -> Option<Self> {
        match product_id {
            JOYCON_LEFT_PRODUCT_ID => Some(ControllerKind::JoyConLeft),
            JOYCON_RIGHT_PRODUCT_ID => Some(ControllerKind::JoyConRight),
            PRO_CONTROLLER_PRODUCT_ID => Some(ControllerKind::ProController),
            _ => None,
        }
    }

    /// The single hand of a Joy-Con; `None` for a Pro Controller
    pub fn hand(self) -> Option<Hand> {
        match self {
            ControllerKind::JoyConLeft => Some(Hand::Left),
            ControllerKind::JoyConRight => Some(Hand::Right),
            ControllerKind::ProController => None,
        }
    }

    /// Hands whose inputs this device produces
    pub fn hands(self) -> &'static [Hand] {
        match self {
            ControllerKind::JoyConLeft => &[Hand::Left],
            ControllerKind::JoyConRight => &[Hand::Right],
            ControllerKind::ProController => &[Hand::Left, Hand::Right],
        }
    }

    /// Joy-Con of the opposite hand, used by the pairing rule
    pub fn partner(self) -> Option<Self> {
        match self {
            ControllerKind::JoyConLeft => Some(ControllerKind::JoyConRight),
            ControllerKind::JoyConRight => Some(ControllerKind::JoyConLeft),
            ControllerKind::ProController => None,
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerKind::JoyConLeft => "Joy-Con (L)",
            ControllerKind::JoyConRight => "Joy-Con (R)",
            ControllerKind::ProController => "Pro Controller",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_product_id() {
        assert_eq!(ControllerKind::from_product_id(0x2006), Some(ControllerKind::JoyConLeft));
        assert_eq!(ControllerKind::from_product_id(0x2007), Some(ControllerKind::JoyConRight));
        assert_eq!(ControllerKind::from_product_id(0x2009), Some(ControllerKind::ProController));
        assert_eq!(ControllerKind::from_product_id(0x200E), None);
    }

    #[test]
    fn test_partner_is_opposite_hand() {
        assert_eq!(ControllerKind::JoyConLeft.partner(), Some(ControllerKind::JoyConRight));
        assert_eq!(ControllerKind::JoyConRight.partner(), Some(ControllerKind::JoyConLeft));
        assert_eq!(ControllerKind::ProController.partner(), None);
    }
}
