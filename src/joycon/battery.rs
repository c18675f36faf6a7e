//! Battery level reported in the high nibble of byte 2 of Full-mode reports.

use log::warn;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatteryCharge {
    Empty,
    Critical,
    Low,
    Medium,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatteryLevel {
    pub charge: BatteryCharge,
    pub charging: bool,
}

impl BatteryLevel {
    /// Decode the 4-bit battery field: bits 3..1 level, bit 0 charging.
    pub fn from_nibble(nibble: u8) -> Self {
        let charge = match (nibble & 0x0E) >> 1 {
            4 => BatteryCharge::Full,
            3 => BatteryCharge::Medium,
            2 => BatteryCharge::Low,
            1 => BatteryCharge::Critical,
            _ => BatteryCharge::Empty,
        };
        Self {
            charge,
            charging: nibble & 0x01 != 0,
        }
    }

    /// Critical or empty and not on the charger
    pub fn is_low(&self) -> bool {
        self.charge <= BatteryCharge::Critical && !self.charging
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.charge)?;
        if self.charging {
            f.write_str(" (charging)")?;
        }
        Ok(())
    }
}

/// Tell the user a controller is running low.
///
/// Logs a warning; on Windows also shows a message box on its own thread
/// so the caller is not blocked.
pub fn notify_low_battery(name: &str, level: BatteryLevel) {
    let msg = format!("{} : low battery ({})", name, level);
    warn!("{}", msg);

    #[cfg(windows)]
    {
        let spawned = std::thread::Builder::new()
            .name("battery-alert".to_string())
            .spawn(move || show_alert(&msg));
        if let Err(e) = spawned {
            warn!("Could not show battery alert: {}", e);
        }
    }
}

#[cfg(windows)]
fn show_alert(msg: &str) {
    use std::ffi::OsStr;
    use std::iter::once;
    use std::os::windows::ffi::OsStrExt;

    let title: Vec<u16> = OsStr::new("Alert Joy-Con").encode_wide().chain(once(0)).collect();
    let message: Vec<u16> = OsStr::new(msg).encode_wide().chain(once(0)).collect();

    unsafe {
        use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONWARNING, MB_OK};
        let _ = MessageBoxW(
            None,
            windows::core::PCWSTR(message.as_ptr()),
            windows::core::PCWSTR(title.as_ptr()),
            MB_OK | MB_ICONWARNING,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_levels() {
        assert_eq!(BatteryLevel::from_nibble(8).charge, BatteryCharge::Full);
        assert_eq!(BatteryLevel::from_nibble(6).charge, BatteryCharge::Medium);
        assert_eq!(BatteryLevel::from_nibble(4).charge, BatteryCharge::Low);
        assert_eq!(BatteryLevel::from_nibble(2).charge, BatteryCharge::Critical);
        assert_eq!(BatteryLevel::from_nibble(0).charge, BatteryCharge::Empty);
        assert!(BatteryLevel::from_nibble(3).charging);
    }

    #[test]
    fn test_low_ignores_charging() {
        assert!(BatteryLevel::from_nibble(2).is_low());
        assert!(!BatteryLevel::from_nibble(3).is_low());
        assert!(!BatteryLevel::from_nibble(4).is_low());
    }
}
