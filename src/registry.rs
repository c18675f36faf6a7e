//! Controller registry and pairing engine
//!
//! Owns the table of registered physical controllers, the list of virtual
//! pads, and the pairing table between them. Every registration and
//! unregistration runs under one lock so two lone Joy-Cons connecting at
//! the same time cannot both claim the same solo pad.
//!
//! Pairing rule:
//! - a Pro Controller always gets a pad of its own;
//! - a Joy-Con joins the pad of the first registered Joy-Con of the other
//!   hand that still has its pad to itself, otherwise it gets a new pad.
//!
//! Pads are never destroyed; a pad left without devices stays plugged in
//! until the process exits.

use crate::backend::{BackendError, GamepadBackend};
use crate::gamepad::VirtualController;
use crate::joycon::{BatteryLevel, ConnectionState, ControllerKind, FactoryCalibration};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Device {0} is already registered")]
    AlreadyRegistered(String),

    #[error("Virtual pad could not be created: {0}")]
    Backend(#[from] BackendError),
}

pub type SharedPad = Arc<Mutex<VirtualController>>;

/// Registry record of one physical controller
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalController {
    pub id: String,
    pub serial: String,
    pub kind: ControllerKind,
    pub state: ConnectionState,
    pub calibration: Option<FactoryCalibration>,
    pub body_color: Option<[u8; 3]>,
    pub battery: Option<BatteryLevel>,
    low_battery_alerted: bool,
}

#[derive(Default)]
struct RegistryInner {
    /// Registration order
    physical: Vec<PhysicalController>,
    /// Transport id -> pad index
    mapping: HashMap<String, usize>,
    virtuals: Vec<SharedPad>,
}

impl RegistryInner {
    fn find(&self, id: &str) -> Option<&PhysicalController> {
        self.physical.iter().find(|p| p.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut PhysicalController> {
        self.physical.iter_mut().find(|p| p.id == id)
    }

    fn references(&self, index: usize) -> usize {
        self.mapping.values().filter(|v| **v == index).count()
    }

    /// Pad of the oldest registered `partner` kind device that is alone on it
    fn solo_partner_pad(&self, partner: ControllerKind) -> Option<usize> {
        self.physical
            .iter()
            .filter(|p| p.kind == partner)
            .filter_map(|p| self.mapping.get(&p.id).copied())
            .find(|index| self.references(*index) == 1)
    }

    fn allocate(&mut self, gamepad: &dyn GamepadBackend) -> Result<usize, RegistryError> {
        let index = self.virtuals.len();
        let mut pad = VirtualController::new(index, gamepad.create_controller()?);
        pad.connect()?;
        info!("Created virtual pad #{}", index);
        self.virtuals.push(Arc::new(Mutex::new(pad)));
        Ok(index)
    }
}

/// Shared registry of physical and virtual controllers
#[derive(Default)]
pub struct ControllerRegistry {
    inner: Mutex<RegistryInner>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a physical controller and assign it a virtual pad.
    ///
    /// Returns the index of the assigned pad.
    pub fn register(
        &self,
        id: &str,
        serial: &str,
        kind: ControllerKind,
        gamepad: &dyn GamepadBackend,
    ) -> Result<usize, RegistryError> {
        let mut inner = self.lock();
        if inner.mapping.contains_key(id) || inner.physical.iter().any(|p| p.serial == serial) {
            return Err(RegistryError::AlreadyRegistered(id.to_string()));
        }

        let shared = kind.partner().and_then(|partner| inner.solo_partner_pad(partner));
        let index = match shared {
            Some(index) => {
                info!("Pairing {} {} with virtual pad #{}", kind, id, index);
                index
            }
            None => inner.allocate(gamepad)?,
        };

        inner.physical.push(PhysicalController {
            id: id.to_string(),
            serial: serial.to_string(),
            kind,
            state: ConnectionState::Connecting,
            calibration: None,
            body_color: None,
            battery: None,
            low_battery_alerted: false,
        });
        inner.mapping.insert(id.to_string(), index);
        info!("Registered {} {} -> virtual pad #{}", kind, id, index);
        Ok(index)
    }

    /// Remove a physical controller. Its virtual pad is kept.
    pub fn unregister(&self, id: &str) -> Option<PhysicalController> {
        let mut inner = self.lock();
        let position = inner.physical.iter().position(|p| p.id == id)?;
        let record = inner.physical.remove(position);
        if let Some(index) = inner.mapping.remove(id) {
            debug!("Virtual pad #{} now has {} device(s)", index, inner.references(index));
        }
        info!("Unregistered {} {}", record.kind, id);
        Some(record)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().mapping.contains_key(id)
    }

    /// Whether a controller with this hardware serial is registered,
    /// under any transport id
    pub fn contains_serial(&self, serial: &str) -> bool {
        self.lock().physical.iter().any(|p| p.serial == serial)
    }

    /// Index of the pad `id` is mapped to
    pub fn mapping_for(&self, id: &str) -> Option<usize> {
        self.lock().mapping.get(id).copied()
    }

    /// Pad `id` is mapped to
    pub fn virtual_for(&self, id: &str) -> Option<SharedPad> {
        let inner = self.lock();
        let index = *inner.mapping.get(id)?;
        inner.virtuals.get(index).cloned()
    }

    pub fn virtual_count(&self) -> usize {
        self.lock().virtuals.len()
    }

    /// Registered transport ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.lock().physical.iter().map(|p| p.id.clone()).collect()
    }

    /// Snapshot of one physical controller record
    pub fn physical(&self, id: &str) -> Option<PhysicalController> {
        self.lock().find(id).cloned()
    }

    pub fn kind_of(&self, id: &str) -> Option<ControllerKind> {
        self.lock().find(id).map(|p| p.kind)
    }

    pub fn state_of(&self, id: &str) -> Option<ConnectionState> {
        self.lock().find(id).map(|p| p.state)
    }

    pub fn set_state(&self, id: &str, state: ConnectionState) {
        if let Some(record) = self.lock().find_mut(id) {
            if record.state != state {
                debug!("{}: {:?} -> {:?}", id, record.state, state);
            }
            record.state = state;
            if state == ConnectionState::Connecting {
                record.low_battery_alerted = false;
            }
        }
    }

    /// Store the outcome of negotiation
    pub fn set_negotiated(&self, id: &str, calibration: Option<FactoryCalibration>, body_color: Option<[u8; 3]>) {
        if let Some(record) = self.lock().find_mut(id) {
            record.calibration = calibration;
            record.body_color = body_color;
        }
    }

    pub fn calibration_of(&self, id: &str) -> Option<FactoryCalibration> {
        self.lock().find(id).and_then(|p| p.calibration)
    }

    /// Record the latest battery level.
    ///
    /// Returns true the first time a low level is seen on this connection.
    pub fn update_battery(&self, id: &str, level: BatteryLevel) -> bool {
        let mut inner = self.lock();
        let Some(record) = inner.find_mut(id) else {
            return false;
        };
        record.battery = Some(level);
        if level.is_low() && !record.low_battery_alerted {
            record.low_battery_alerted = true;
            return true;
        }
        false
    }
}
