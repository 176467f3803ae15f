#![forbid(unsafe_code)]

//! Quantification settings.
//!
//! Every field has a default, so a TOML document only needs the keys it
//! overrides:
//!
//! ```
//! use eels_quantification::QuantificationConfig;
//!
//! let config = QuantificationConfig::from_toml_str(r#"legend_position = "top-left""#)?;
//! assert_eq!(config.legend_position, "top-left");
//! assert_eq!(config.processing_id, "eels.background_subtraction2");
//! # Ok::<(), eels_quantification::QuantificationError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{QuantificationError, Result};

/// Identifiers, heuristics and styling used by quantification displays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantificationConfig {
    /// Processing identifier of the background-subtraction computation.
    pub processing_id: String,
    /// Record type of a quantification.
    pub quantification_structure_type: String,
    /// Record type of a quantification display.
    pub display_structure_type: String,
    /// Fit window ahead of a drawn signal, as factors of its fractional start.
    pub fit_ahead: [f64; 2],
    /// Fit window behind a drawn signal, as factors of its fractional end.
    pub fit_behind: [f64; 2],
    pub signal_label: String,
    pub signal_fill_color: String,
    pub background_label: String,
    pub background_fill_color: String,
    /// Value of the display's `legend_position` property while edges are shown.
    pub legend_position: String,
}

impl Default for QuantificationConfig {
    fn default() -> Self {
        Self {
            processing_id: "eels.background_subtraction2".to_owned(),
            quantification_structure_type: "nion.eels_quantification".to_owned(),
            display_structure_type: "nion.eels_quantification_display".to_owned(),
            fit_ahead: [0.8, 0.9],
            fit_behind: [1.1, 1.2],
            signal_label: "Signal".to_owned(),
            signal_fill_color: "lime".to_owned(),
            background_label: "Background".to_owned(),
            background_fill_color: "rgba(255, 0, 0, 0.3)".to_owned(),
            legend_position: "top-right".to_owned(),
        }
    }
}

impl QuantificationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no display could work with.
    pub fn validate(&self) -> Result<()> {
        let identifiers = [
            ("processing_id", &self.processing_id),
            ("quantification_structure_type", &self.quantification_structure_type),
            ("display_structure_type", &self.display_structure_type),
        ];
        for (name, value) in identifiers {
            if value.is_empty() {
                return Err(QuantificationError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if self.quantification_structure_type == self.display_structure_type {
            return Err(QuantificationError::InvalidConfig(
                "quantification and display record types must differ".to_owned(),
            ));
        }
        let mut factors = self.fit_ahead.iter().chain(self.fit_behind.iter());
        if factors.any(|factor| !factor.is_finite()) {
            return Err(QuantificationError::InvalidConfig(
                "fit factors must be finite".to_owned(),
            ));
        }
        Ok(())
    }
}
