#![forbid(unsafe_code)]

//! Interfaces to the host application's document model.
//!
//! The quantification plugin never owns data items, graphics, display items
//! or computations. It reaches them through the object-safe traits in this
//! crate, holds them as `Rc<dyn Trait>` references, and learns about their
//! disappearance through each object's about-to-be-removed event.
//!
//! [`memory`] is a complete in-memory host that follows the same cascade
//! rules as the desktop application. It backs every test in the workspace.
//!
//! # Contract
//!
//! 1. About-to-be-removed fires before an object leaves the document, while
//!    it is still fully readable.
//! 2. Removing an object that is not in the document is a no-op.
//! 3. Identity is [`HostObject::id`]; two references to the same object
//!    compare equal through [`HostObjectRef`].
//! 4. Hosts never hold an internal borrow while invoking plugin callbacks,
//!    so callbacks may call back into the host.

pub mod computation;
pub mod document;
pub mod items;
pub mod memory;
pub mod object;
pub mod structure;

pub use computation::Computation;
pub use document::{DocumentModel, RecordCallback};
pub use items::{DataItem, DisplayItem, DisplayLayer, INTERVAL_PROPERTY, IntervalGraphic};
pub use object::{HostObject, HostObjectRef};
pub use structure::DataStructure;
