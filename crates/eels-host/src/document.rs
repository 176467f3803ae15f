#![forbid(unsafe_code)]

//! The document model: container and lifecycle owner of every host object.

use std::rc::Rc;

use eels_core::Subscription;
use uuid::Uuid;

use crate::computation::Computation;
use crate::items::{DataItem, DisplayItem};
use crate::structure::DataStructure;

/// Callback receiving a record and its index in the document.
pub type RecordCallback = Box<dyn Fn(&Rc<dyn DataStructure>, usize)>;

pub trait DocumentModel {
    fn id(&self) -> Uuid;

    /// Create a data item that is not yet part of the document.
    fn create_data_item(&self) -> Rc<dyn DataItem>;
    fn append_data_item(&self, data_item: &Rc<dyn DataItem>, auto_display: bool);
    fn remove_data_item(&self, data_item: &dyn DataItem);
    fn contains_data_item(&self, id: Uuid) -> bool;

    /// Create a computation tagged with `processing_id`, sourced on `source`.
    fn create_computation(
        &self,
        processing_id: &str,
        source: &Rc<dyn DisplayItem>,
    ) -> Rc<dyn Computation>;
    fn append_computation(&self, computation: &Rc<dyn Computation>);
    fn remove_computation(&self, computation: &dyn Computation);
    fn contains_computation(&self, id: Uuid) -> bool;
    fn computations(&self) -> Vec<Rc<dyn Computation>>;

    /// Create a record that is not yet part of the document.
    fn create_data_structure(
        &self,
        structure_type: &str,
        source: Option<&Rc<dyn DataStructure>>,
    ) -> Rc<dyn DataStructure>;
    fn append_data_structure(&self, data_structure: &Rc<dyn DataStructure>);
    fn remove_data_structure(&self, data_structure: &dyn DataStructure);
    fn data_structures(&self) -> Vec<Rc<dyn DataStructure>>;

    fn on_data_structure_inserted(&self, callback: RecordCallback) -> Subscription;
    fn on_data_structure_removed(&self, callback: RecordCallback) -> Subscription;

    /// Called once when the document is closing.
    fn on_about_to_close(&self, callback: Box<dyn Fn()>) -> Subscription;
}
