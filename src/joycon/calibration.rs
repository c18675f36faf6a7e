//! Factory stick calibration and stick normalisation
//!
//! The left and right stick blobs in flash store the same six 12-bit values
//! in different orders:
//!
//! - left:  max-x, max-y, center-x, center-y, min-x, min-y
//! - right: center-x, center-y, min-x, min-y, max-x, max-y
//!
//! "max" and "min" are extents measured from the center, not absolute
//! positions. Both sticks are rotated into the left layout before use.

use crate::joycon::codec::{decode_triplets, CodecError};
use log::debug;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("No stick calibration for {0}: negotiation has not completed")]
    Unavailable(String),
}

/// Raw decoded calibration values as stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactoryCalibration {
    pub left: [u16; 6],
    pub right: [u16; 6],
}

impl FactoryCalibration {
    /// Decode the two 9-byte flash blobs.
    pub fn from_blobs(left: &[u8], right: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            left: to_six(&decode_triplets(left)?, left.len())?,
            right: to_six(&decode_triplets(right)?, right.len())?,
        })
    }
}

fn to_six(values: &[u16], len: usize) -> Result<[u16; 6], CodecError> {
    values
        .try_into()
        .map_err(|_| CodecError::InvalidFormat { len })
}

/// Calibration of one stick in (max, center, min) form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StickCalibration {
    pub max: (u16, u16),
    pub center: (u16, u16),
    pub min: (u16, u16),
}

impl StickCalibration {
    /// Build from six values already in the left-stick layout
    pub fn from_left_layout(v: [u16; 6]) -> Self {
        Self {
            max: (v[0], v[1]),
            center: (v[2], v[3]),
            min: (v[4], v[5]),
        }
    }

    /// Build from six values in the right-stick layout
    pub fn from_right_layout(v: [u16; 6]) -> Self {
        Self::from_left_layout([v[4], v[5], v[0], v[1], v[2], v[3]])
    }

    /// Normalise a raw sample to roughly [-1, 1] on each axis.
    pub fn normalize(&self, raw: (u16, u16)) -> (f32, f32) {
        (
            normalize_axis(raw.0 as i32 - self.center.0 as i32, self.max.0, self.min.0),
            normalize_axis(raw.1 as i32 - self.center.1 as i32, self.max.1, self.min.1),
        )
    }
}

/// Normalise a center-relative sample by the extent on its side.
///
/// A zero extent (blank flash) yields 0.
pub fn normalize_axis(offset: i32, max_extent: u16, min_extent: u16) -> f32 {
    let extent = if offset > 0 { max_extent } else { min_extent };
    if extent == 0 {
        return 0.0;
    }
    offset as f32 / extent as f32
}

/// Scale a normalised value to the signed 16-bit axis range.
pub fn scale_to_axis(value: f32, deadzone: f32) -> i16 {
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < deadzone {
        return 0;
    }
    (value * i16::MAX as f32).round() as i16
}

/// Left and right stick calibration of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StickCalibrationPair {
    pub left: StickCalibration,
    pub right: StickCalibration,
}

impl From<&FactoryCalibration> for StickCalibrationPair {
    fn from(raw: &FactoryCalibration) -> Self {
        Self {
            left: StickCalibration::from_left_layout(raw.left),
            right: StickCalibration::from_right_layout(raw.right),
        }
    }
}

/// Per-device normalised calibration, filled lazily on first use.
///
/// Entries are written once per negotiation and read-only afterwards.
/// Concurrent first lookups write identical values.
#[derive(Debug, Default)]
pub struct CalibrationCache {
    entries: RwLock<HashMap<String, StickCalibrationPair>>,
}

impl CalibrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached calibration for `transport_id`, populating it from `raw` on
    /// first request.
    pub fn resolve(
        &self,
        transport_id: &str,
        raw: Option<&FactoryCalibration>,
    ) -> Result<StickCalibrationPair, CalibrationError> {
        if let Some(pair) = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(transport_id).copied())
        {
            return Ok(pair);
        }

        let raw = raw.ok_or_else(|| CalibrationError::Unavailable(transport_id.to_string()))?;
        let pair = StickCalibrationPair::from(raw);
        if let Ok(mut entries) = self.entries.write() {
            debug!("Cached stick calibration for {}: {:?}", transport_id, pair);
            entries.insert(transport_id.to_string(), pair);
        }
        Ok(pair)
    }

    /// Drop the entry so the next request re-derives it.
    pub fn invalidate(&self, transport_id: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(transport_id);
        }
    }

    pub fn contains(&self, transport_id: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(transport_id))
            .unwrap_or(false)
    }
}
