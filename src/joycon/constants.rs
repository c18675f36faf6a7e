//! Joy-Con / Pro Controller protocol constants
//!
//! This module contains all the constants needed for classic Joy-Con
//! communication over Bluetooth HID:
//! - USB/HID vendor and product identifiers
//! - Output command ids and sub-commands
//! - SPI flash addresses
//! - Input report ids and fixed frame offsets

// ============================================================================
// HID Discovery Constants
// ============================================================================

/// Nintendo Co., Ltd. HID vendor id
pub const NINTENDO_VENDOR_ID: u16 = 0x057E;

/// Product id of the left Joy-Con
pub const JOYCON_LEFT_PRODUCT_ID: u16 = 0x2006;

/// Product id of the right Joy-Con
pub const JOYCON_RIGHT_PRODUCT_ID: u16 = 0x2007;

/// Product id of the Pro Controller
pub const PRO_CONTROLLER_PRODUCT_ID: u16 = 0x2009;

// ============================================================================
// Frame Layout
// ============================================================================

/// Every frame exchanged with the device is 64 bytes long
pub const REPORT_LEN: usize = 64;

/// Length of the rumble block carried by every output command
pub const RUMBLE_LEN: usize = 8;

/// Rumble block that keeps both actuators idle
pub const NEUTRAL_RUMBLE: [u8; RUMBLE_LEN] = [0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40];

/// Offset of the sub-command id inside an output command frame
pub const SUBCOMMAND_OFFSET: usize = 2 + RUMBLE_LEN;

/// Offset of the echoed sub-command id in a sub-command reply
pub const REPLY_SUBCOMMAND_OFFSET: usize = 14;

/// Offset of the flash payload in an SPI read reply
pub const REPLY_SPI_DATA_OFFSET: usize = 20;

// ============================================================================
// Output Commands
// ============================================================================

/// Rumble plus sub-command
pub const CMD_RUMBLE_AND_SUBCOMMAND: u8 = 0x01;

/// Rumble only (no sub-command fields on the wire)
pub const CMD_RUMBLE_ONLY: u8 = 0x10;

/// Set input report mode, argument is the report id to stream
pub const SUBCMD_SET_INPUT_MODE: u8 = 0x03;

/// Read `len` bytes of SPI flash at a little-endian 32-bit address
pub const SUBCMD_SPI_READ: u8 = 0x10;

/// Set player lights, low nibble = solid LEDs
pub const SUBCMD_SET_PLAYER_LIGHTS: u8 = 0x30;

// ============================================================================
// Input Reports
// ============================================================================

/// Standard full-mode report (buttons + 12-bit sticks + IMU)
pub const REPORT_ID_FULL: u8 = 0x30;

/// Simple HID mode report (buttons + hat)
pub const REPORT_ID_SIMPLE: u8 = 0x3F;

/// Sub-command reply report
pub const REPORT_ID_SUBCOMMAND_REPLY: u8 = 0x21;

// ============================================================================
// SPI Flash
// ============================================================================

/// Factory calibration of the left stick (9 bytes)
pub const SPI_LEFT_STICK_CALIBRATION: u32 = 0x603D;

/// Factory calibration of the right stick (9 bytes)
pub const SPI_RIGHT_STICK_CALIBRATION: u32 = 0x6046;

/// Size of one stick calibration blob
pub const STICK_CALIBRATION_LEN: u8 = 9;

/// Body colour, 24-bit RGB
pub const SPI_BODY_COLOR: u32 = 0x6050;

/// Size of the body colour blob
pub const BODY_COLOR_LEN: u8 = 3;
