#![forbid(unsafe_code)]

//! In-memory computation node.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use eels_core::{Event, Subscription};
use uuid::Uuid;

use crate::computation::Computation;
use crate::items::DataItem;
use crate::object::{HostObject, HostObjectRef};

pub struct MemoryComputation {
    id: Uuid,
    processing_id: String,
    source_id: Option<Uuid>,
    variables: RefCell<BTreeMap<String, serde_json::Value>>,
    objects: RefCell<BTreeMap<String, HostObjectRef>>,
    object_lists: RefCell<BTreeMap<String, Vec<HostObjectRef>>>,
    results: RefCell<BTreeMap<String, Rc<dyn DataItem>>>,
    pub(crate) about_to_be_removed: Event<()>,
}

impl MemoryComputation {
    pub(crate) fn new(processing_id: &str, source_id: Option<Uuid>) -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            processing_id: processing_id.to_owned(),
            source_id,
            variables: RefCell::new(BTreeMap::new()),
            objects: RefCell::new(BTreeMap::new()),
            object_lists: RefCell::new(BTreeMap::new()),
            results: RefCell::new(BTreeMap::new()),
            about_to_be_removed: Event::new(),
        })
    }

    /// Whether `id` is bound as a single input or sits in an input list.
    pub(crate) fn uses_input(&self, id: Uuid) -> bool {
        self.objects.borrow().values().any(|o| o.id() == id)
            || self
                .object_lists
                .borrow()
                .values()
                .any(|list| list.iter().any(|o| o.id() == id))
    }

    /// Whether `id` is bound as a single (non-list) input.
    pub(crate) fn uses_single_input(&self, id: Uuid) -> bool {
        self.objects.borrow().values().any(|o| o.id() == id)
    }

    pub(crate) fn produces(&self, id: Uuid) -> bool {
        self.results.borrow().values().any(|item| item.id() == id)
    }

    pub(crate) fn drop_from_object_lists(&self, id: Uuid) {
        for list in self.object_lists.borrow_mut().values_mut() {
            list.retain(|o| o.id() != id);
        }
    }

    pub(crate) fn result_items(&self) -> Vec<Rc<dyn DataItem>> {
        self.results.borrow().values().cloned().collect()
    }
}

impl HostObject for MemoryComputation {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_be_removed.subscribe(move |()| callback())
    }
}

impl Computation for MemoryComputation {
    fn processing_id(&self) -> String {
        self.processing_id.clone()
    }

    fn source_id(&self) -> Option<Uuid> {
        self.source_id
    }

    fn create_variable(&self, name: &str, value: serde_json::Value) {
        self.variables.borrow_mut().insert(name.to_owned(), value);
    }

    fn variable(&self, name: &str) -> Option<serde_json::Value> {
        self.variables.borrow().get(name).cloned()
    }

    fn create_object(&self, name: &str, object: HostObjectRef) {
        self.objects.borrow_mut().insert(name.to_owned(), object);
    }

    fn bound_object(&self, name: &str) -> Option<HostObjectRef> {
        self.objects.borrow().get(name).cloned()
    }

    fn create_objects(&self, name: &str, objects: Vec<HostObjectRef>) {
        self.object_lists
            .borrow_mut()
            .insert(name.to_owned(), objects);
    }

    fn insert_item_into_objects(&self, name: &str, index: usize, object: HostObjectRef) {
        let mut lists = self.object_lists.borrow_mut();
        let list = lists.entry(name.to_owned()).or_default();
        let index = index.min(list.len());
        list.insert(index, object);
    }

    fn objects(&self, name: &str) -> Vec<HostObjectRef> {
        self.object_lists
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn create_result(&self, name: &str, data_item: Rc<dyn DataItem>) {
        self.results.borrow_mut().insert(name.to_owned(), data_item);
    }

    fn result(&self, name: &str) -> Option<Rc<dyn DataItem>> {
        self.results.borrow().get(name).cloned()
    }
}

impl fmt::Debug for MemoryComputation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryComputation")
            .field("id", &self.id)
            .field("processing_id", &self.processing_id)
            .field("variables", &self.variables.borrow())
            .finish()
    }
}
