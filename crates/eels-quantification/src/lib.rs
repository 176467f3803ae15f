#![forbid(unsafe_code)]

//! EELS edge quantification on top of a host document model.
//!
//! # Layers
//!
//! ```text
//!   ManagerRegistry ── one per application
//!     EelsQuantificationManager ── one per document, follows the records
//!       EelsQuantification ── edges, persisted in a record
//!       EelsQuantificationDisplay ── shown edges on one display item
//!         EelsEdgeDisplay ── graphics, layers and computation of one edge
//!           IntervalBinding      signal interval <-> signal graphic
//!           IntervalListBinding  fit intervals   <-> fit graphics
//! ```
//!
//! Everything is single threaded and synchronous: a call returns after every
//! listener has run and every affected record has been rewritten. Objects
//! owned by the host (data items, graphics, computations) are referenced,
//! never owned, and are released when the host announces their removal.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use eels_core::{Calibration, EelsEdge, EelsInterval};
//! use eels_host::memory::MemoryDocument;
//! use eels_host::{DataItem, DisplayItem, DocumentModel};
//! use eels_quantification::ManagerRegistry;
//!
//! let document = MemoryDocument::new();
//! let spectrum = document.add_data_item(2048, Calibration::identity(), "Spectrum");
//! let display_item = document.add_display_item(&spectrum);
//!
//! let registry = ManagerRegistry::default();
//! let host: Rc<dyn DocumentModel> = document.clone();
//! let manager = registry.get_instance(&host);
//! let quantification = manager.create_eels_quantification()?;
//! let display = manager.create_eels_quantification_display(
//!     &quantification,
//!     &(display_item as Rc<dyn DisplayItem>),
//!     &(spectrum as Rc<dyn DataItem>),
//! )?;
//!
//! let edge = Rc::new(EelsEdge::new(
//!     Some(EelsInterval::from_bounds(400.0, 420.0)),
//!     vec![EelsInterval::from_bounds(340.0, 380.0)],
//! ));
//! display.add_eels_edge(Rc::clone(&edge))?;
//! display.show_eels_edge(&edge)?;
//! assert!(display.is_eels_edge_visible(&edge));
//! assert_eq!(document.computation_count(), 1);
//! # Ok::<(), eels_quantification::QuantificationError>(())
//! ```

pub mod config;
pub mod edge_display;
pub mod error;
pub mod interval_binding;
pub mod interval_list_binding;
pub mod manager;
pub mod quantification;
pub mod quantification_display;
pub mod record_view;

pub use config::QuantificationConfig;
pub use edge_display::{EdgeDisplayResources, EelsEdgeDisplay, ShouldHide};
pub use error::{QuantificationError, Result};
pub use interval_binding::IntervalBinding;
pub use interval_list_binding::{FIT_INTERVAL_GRAPHICS, IntervalListBinding, SharedGraphics};
pub use manager::{EelsQuantificationManager, ManagerRegistry};
pub use quantification::{EELS_EDGES, EelsQuantification};
pub use quantification_display::{
    EELS_EDGE_DISPLAYS, EdgeDisplayRecord, EelsQuantificationDisplay, ShouldRemove,
};
pub use record_view::{RecordChange, RecordView};
