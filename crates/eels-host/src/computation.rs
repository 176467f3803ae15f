#![forbid(unsafe_code)]

//! Dataflow nodes evaluated by the host.
//!
//! The plugin only declares a computation's inputs and outputs; the host
//! runs it, keeps its object lists current when bound graphics disappear,
//! and deletes its results when the computation itself is removed.

use std::rc::Rc;

use uuid::Uuid;

use crate::items::DataItem;
use crate::object::{HostObject, HostObjectRef};

pub trait Computation: HostObject {
    /// Identifier of the processing this computation performs.
    fn processing_id(&self) -> String;

    /// Identity of the display item the computation was created for.
    fn source_id(&self) -> Option<Uuid>;

    fn create_variable(&self, name: &str, value: serde_json::Value);
    fn variable(&self, name: &str) -> Option<serde_json::Value>;

    /// Bind a single input object.
    fn create_object(&self, name: &str, object: HostObjectRef);
    fn bound_object(&self, name: &str) -> Option<HostObjectRef>;

    /// Bind an ordered list of input objects.
    fn create_objects(&self, name: &str, objects: Vec<HostObjectRef>);
    fn insert_item_into_objects(&self, name: &str, index: usize, object: HostObjectRef);
    fn objects(&self, name: &str) -> Vec<HostObjectRef>;

    /// Bind a named output to a data item.
    fn create_result(&self, name: &str, data_item: Rc<dyn DataItem>);
    fn result(&self, name: &str) -> Option<Rc<dyn DataItem>>;
}
