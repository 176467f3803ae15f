#![forbid(unsafe_code)]

//! Energy intervals and their fractional representation.
//!
//! An [`EelsInterval`] is a range in electron-volts whose bounds may each be
//! absent. Graphics on a display are positioned with a fractional pair
//! `(f0, f1)` relative to the sampled data length. The two are related by
//! the data's calibration:
//!
//! ```text
//! ev = calibration(f * data_len)        f = calibration⁻¹(ev) / data_len
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Empty data | `data_len == 0` | `EelsError::EmptyData` |
//! | Flat calibration | `scale == 0` | `EelsError::DegenerateCalibration` |
//! | Partial interval | a bound is `None` during `to_fractional_interval` | `EelsError::MissingBound` |

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::error::{EelsError, Result};

/// A range expressed as fractions of the sampled data length.
pub type FractionalInterval = (f64, f64);

/// A possibly partial range in physical units (eV).
///
/// Serializes only the bounds that are present, as `start_ev` / `end_ev`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EelsInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ev: Option<f64>,
}

impl EelsInterval {
    /// Create an interval from optional bounds.
    #[must_use]
    pub const fn new(start_ev: Option<f64>, end_ev: Option<f64>) -> Self {
        Self { start_ev, end_ev }
    }

    /// Create an interval with both bounds present.
    #[must_use]
    pub const fn from_bounds(start_ev: f64, end_ev: f64) -> Self {
        Self::new(Some(start_ev), Some(end_ev))
    }

    /// `end - start`, when both bounds are present.
    #[must_use]
    pub fn width_ev(&self) -> Option<f64> {
        match (self.start_ev, self.end_ev) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Whether both bounds are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.start_ev.is_some() && self.end_ev.is_some()
    }

    /// Build an interval from a fractional pair.
    pub fn from_fractional_interval(
        data_len: usize,
        calibration: &Calibration,
        interval: FractionalInterval,
    ) -> Result<Self> {
        if data_len == 0 {
            return Err(EelsError::EmptyData);
        }
        let len = data_len as f64;
        let start_pixel = interval.0 * len;
        let end_pixel = interval.1 * len;
        Ok(Self::from_bounds(
            calibration.convert_to_calibrated_value(start_pixel),
            calibration.convert_to_calibrated_value(end_pixel),
        ))
    }

    /// Express this interval as a fractional pair.
    pub fn to_fractional_interval(
        &self,
        data_len: usize,
        calibration: &Calibration,
    ) -> Result<FractionalInterval> {
        if data_len == 0 {
            return Err(EelsError::EmptyData);
        }
        if !calibration.is_invertible() {
            return Err(EelsError::DegenerateCalibration);
        }
        let start_ev = self.start_ev.ok_or(EelsError::MissingBound("start"))?;
        let end_ev = self.end_ev.ok_or(EelsError::MissingBound("end"))?;
        let len = data_len as f64;
        Ok((
            calibration.convert_from_calibrated_value(start_ev) / len,
            calibration.convert_from_calibrated_value(end_ev) / len,
        ))
    }
}

// ---------------------------------------------------------------------------
// IntervalConverter
// ---------------------------------------------------------------------------

/// A fixed `(data_len, calibration)` pair used by bindings to move values
/// between an edge and a graphic without re-reading the data item.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalConverter {
    data_len: usize,
    calibration: Calibration,
}

impl IntervalConverter {
    /// Validate and capture the conversion parameters.
    pub fn new(data_len: usize, calibration: Calibration) -> Result<Self> {
        if data_len == 0 {
            return Err(EelsError::EmptyData);
        }
        if !calibration.is_invertible() {
            return Err(EelsError::DegenerateCalibration);
        }
        Ok(Self {
            data_len,
            calibration,
        })
    }

    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Energy interval to fractional pair.
    pub fn convert(&self, interval: &EelsInterval) -> Result<FractionalInterval> {
        interval.to_fractional_interval(self.data_len, &self.calibration)
    }

    /// Fractional pair to energy interval.
    #[must_use]
    pub fn convert_back(&self, interval: FractionalInterval) -> EelsInterval {
        let len = self.data_len as f64;
        EelsInterval::from_bounds(
            self.calibration.convert_to_calibrated_value(interval.0 * len),
            self.calibration.convert_to_calibrated_value(interval.1 * len),
        )
    }
}
