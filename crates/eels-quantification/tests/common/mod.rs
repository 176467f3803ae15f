#![allow(dead_code)]

use std::rc::Rc;

use eels_core::{Calibration, EelsEdge, EelsInterval, FractionalInterval};
use eels_host::memory::{MemoryDataItem, MemoryDisplayItem, MemoryDocument};
use eels_host::{DataItem, DisplayItem, DocumentModel};
use eels_quantification::{
    EelsQuantification, EelsQuantificationDisplay, EelsQuantificationManager, ManagerRegistry,
};

pub const TOLERANCE: f64 = 1e-9;

/// A document with one spectrum on one display, and its manager.
pub struct Session {
    pub document: Rc<MemoryDocument>,
    pub host: Rc<dyn DocumentModel>,
    pub spectrum: Rc<MemoryDataItem>,
    pub display_item: Rc<MemoryDisplayItem>,
    pub registry: ManagerRegistry,
    pub manager: Rc<EelsQuantificationManager>,
}

impl Session {
    pub fn new(data_len: usize) -> Self {
        Self::with_calibration(data_len, Calibration::identity())
    }

    pub fn with_calibration(data_len: usize, calibration: Calibration) -> Self {
        let document = MemoryDocument::new();
        let host: Rc<dyn DocumentModel> = document.clone();
        let spectrum = document.add_data_item(data_len, calibration, "EELS Spectrum");
        let display_item = document.add_display_item(&spectrum);
        let registry = ManagerRegistry::default();
        let manager = registry.get_instance(&host);
        Self {
            document,
            host,
            spectrum,
            display_item,
            registry,
            manager,
        }
    }

    pub fn display_item(&self) -> Rc<dyn DisplayItem> {
        self.display_item.clone()
    }

    pub fn data_item(&self) -> Rc<dyn DataItem> {
        self.spectrum.clone()
    }

    /// A fresh quantification with a display on the session's display item.
    pub fn quantification_display(
        &self,
    ) -> (Rc<EelsQuantification>, Rc<EelsQuantificationDisplay>) {
        let quantification = self.manager.create_eels_quantification().unwrap();
        let display = self
            .manager
            .create_eels_quantification_display(
                &quantification,
                &self.display_item(),
                &self.data_item(),
            )
            .unwrap();
        (quantification, display)
    }
}

pub fn edge(signal: (f64, f64), fits: &[(f64, f64)]) -> Rc<EelsEdge> {
    Rc::new(EelsEdge::new(
        Some(EelsInterval::from_bounds(signal.0, signal.1)),
        fits.iter()
            .map(|&(start, end)| EelsInterval::from_bounds(start, end))
            .collect(),
    ))
}

pub fn assert_fraction_eq(actual: FractionalInterval, expected: FractionalInterval) {
    assert!(
        (actual.0 - expected.0).abs() < TOLERANCE && (actual.1 - expected.1).abs() < TOLERANCE,
        "expected {expected:?}, got {actual:?}"
    );
}
