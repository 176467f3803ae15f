#![forbid(unsafe_code)]

//! In-memory structured record.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use eels_core::{Event, Subscription};
use uuid::Uuid;

use crate::object::{HostObject, HostObjectRef};
use crate::structure::DataStructure;

pub struct MemoryDataStructure {
    id: Uuid,
    structure_type: String,
    source_id: Option<Uuid>,
    properties: RefCell<BTreeMap<String, serde_json::Value>>,
    references: RefCell<BTreeMap<String, HostObjectRef>>,
    pub(crate) about_to_be_removed: Event<()>,
}

impl MemoryDataStructure {
    pub(crate) fn new(structure_type: &str, source_id: Option<Uuid>) -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            structure_type: structure_type.to_owned(),
            source_id,
            properties: RefCell::new(BTreeMap::new()),
            references: RefCell::new(BTreeMap::new()),
            about_to_be_removed: Event::new(),
        })
    }

    /// Every property, as the host would write it to disk.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.properties
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl HostObject for MemoryDataStructure {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_be_removed.subscribe(move |()| callback())
    }
}

impl DataStructure for MemoryDataStructure {
    fn structure_type(&self) -> String {
        self.structure_type.clone()
    }

    fn source_id(&self) -> Option<Uuid> {
        self.source_id
    }

    fn property(&self, name: &str) -> Option<serde_json::Value> {
        self.properties.borrow().get(name).cloned()
    }

    fn set_property(&self, name: &str, value: serde_json::Value) {
        self.properties.borrow_mut().insert(name.to_owned(), value);
    }

    fn referenced_object(&self, name: &str) -> Option<HostObjectRef> {
        self.references.borrow().get(name).cloned()
    }

    fn set_referenced_object(&self, name: &str, object: Option<HostObjectRef>) {
        let mut references = self.references.borrow_mut();
        match object {
            Some(object) => {
                references.insert(name.to_owned(), object);
            }
            None => {
                references.remove(name);
            }
        }
    }
}

impl fmt::Debug for MemoryDataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDataStructure")
            .field("id", &self.id)
            .field("structure_type", &self.structure_type)
            .field("source_id", &self.source_id)
            .finish()
    }
}
