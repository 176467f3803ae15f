#![forbid(unsafe_code)]

//! Affine transform between sample index and physical units.

use serde::{Deserialize, Serialize};

/// `physical = offset + scale * pixel`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub offset: f64,
    pub scale: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
}

impl Calibration {
    /// Create a calibration with the given units.
    #[must_use]
    pub fn new(offset: f64, scale: f64, units: impl Into<String>) -> Self {
        Self {
            offset,
            scale,
            units: units.into(),
        }
    }

    /// The identity calibration (one unit per pixel, no offset).
    #[must_use]
    pub fn identity() -> Self {
        Self::new(0.0, 1.0, "")
    }

    /// Map a pixel position to a physical value.
    #[must_use]
    pub fn convert_to_calibrated_value(&self, pixel: f64) -> f64 {
        self.offset + self.scale * pixel
    }

    /// Map a physical value back to a pixel position.
    ///
    /// Only meaningful when [`Calibration::is_invertible`] holds.
    #[must_use]
    pub fn convert_from_calibrated_value(&self, value: f64) -> f64 {
        (value - self.offset) / self.scale
    }

    /// Whether the transform is strictly monotonic.
    #[must_use]
    pub fn is_invertible(&self) -> bool {
        self.scale != 0.0 && self.scale.is_finite() && self.offset.is_finite()
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}
