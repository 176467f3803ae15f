#![forbid(unsafe_code)]

//! Typed structured records persisted with the document.

use uuid::Uuid;

use crate::object::{HostObject, HostObjectRef};

/// A persisted record with a type tag, JSON properties and object
/// references. Records may name another record as their `source`.
pub trait DataStructure: HostObject {
    fn structure_type(&self) -> String;

    fn source_id(&self) -> Option<Uuid>;

    fn property(&self, name: &str) -> Option<serde_json::Value>;
    fn set_property(&self, name: &str, value: serde_json::Value);

    fn referenced_object(&self, name: &str) -> Option<HostObjectRef>;
    fn set_referenced_object(&self, name: &str, object: Option<HostObjectRef>);
}
