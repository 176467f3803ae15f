#![forbid(unsafe_code)]

//! In-memory reference host.
//!
//! [`MemoryDocument`] implements [`DocumentModel`] with the same cascade
//! rules as the desktop application:
//!
//! | Removed object | Cascade |
//! |----------------|---------|
//! | graphic | dropped from computation object lists; computations binding it as a single input are removed |
//! | computation | its result data items are removed |
//! | data item | display channels showing it are dropped; computations using or producing it are removed |
//! | display item | its graphics and the computations sourced on it are removed |
//! | record | records naming it as their source are removed |
//!
//! About-to-be-removed always fires before the object leaves the document.
//! A removal that is already in progress (reached again through a cascade)
//! is ignored, and so is removing an object that is not in the document.

mod computation;
mod items;
mod structure;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{Calibration, Event, Subscription};
use uuid::Uuid;

pub use computation::MemoryComputation;
pub use items::{MemoryDataItem, MemoryDisplayItem, MemoryIntervalGraphic};
pub use structure::MemoryDataStructure;

use crate::computation::Computation;
use crate::document::{DocumentModel, RecordCallback};
use crate::items::{DataItem, DisplayItem};
use crate::object::HostObject;
use crate::structure::DataStructure;

type RecordChange = (Rc<dyn DataStructure>, usize);

#[derive(Default)]
struct DocumentState {
    data_items: Vec<Rc<MemoryDataItem>>,
    display_items: Vec<Rc<MemoryDisplayItem>>,
    computations: Vec<Rc<MemoryComputation>>,
    data_structures: Vec<Rc<MemoryDataStructure>>,
    // Created through the trait but not appended yet.
    pending_data_items: Vec<Rc<MemoryDataItem>>,
    pending_computations: Vec<Rc<MemoryComputation>>,
    pending_data_structures: Vec<Rc<MemoryDataStructure>>,
    closed: bool,
}

/// A complete document model held in memory.
pub struct MemoryDocument {
    id: Uuid,
    this: Weak<MemoryDocument>,
    state: RefCell<DocumentState>,
    removing: RefCell<HashSet<Uuid>>,
    data_structure_inserted: Event<RecordChange>,
    data_structure_removed: Event<RecordChange>,
    about_to_close: Event<()>,
}

impl MemoryDocument {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: Uuid::new_v4(),
            this: this.clone(),
            state: RefCell::new(DocumentState::default()),
            removing: RefCell::new(HashSet::new()),
            data_structure_inserted: Event::new(),
            data_structure_removed: Event::new(),
            about_to_close: Event::new(),
        })
    }

    /// Create a titled data item and add it to the document without a display.
    pub fn add_data_item(
        &self,
        data_len: usize,
        calibration: Calibration,
        title: &str,
    ) -> Rc<MemoryDataItem> {
        let data_item = MemoryDataItem::new(data_len, calibration);
        data_item.set_title(title);
        self.state
            .borrow_mut()
            .data_items
            .push(Rc::clone(&data_item));
        tracing::trace!(data_item = %data_item.id(), "data item added");
        data_item
    }

    /// Create a display item showing `data_item`.
    pub fn add_display_item(&self, data_item: &Rc<MemoryDataItem>) -> Rc<MemoryDisplayItem> {
        let display_item = MemoryDisplayItem::new(
            self.this.clone(),
            Rc::clone(data_item) as Rc<dyn DataItem>,
        );
        self.state
            .borrow_mut()
            .display_items
            .push(Rc::clone(&display_item));
        tracing::trace!(display_item = %display_item.id(), "display item added");
        display_item
    }

    /// Remove a display item, its graphics and every computation sourced on it.
    pub fn remove_display_item(&self, display_item: &MemoryDisplayItem) {
        let id = display_item.id();
        if !self.contains_display_item(id) || !self.begin_removal(id) {
            return;
        }
        display_item.about_to_be_removed.notify(&());
        display_item.remove_all_graphics();
        let sourced: Vec<Rc<MemoryComputation>> = self
            .state
            .borrow()
            .computations
            .iter()
            .filter(|computation| computation.source_id() == Some(id))
            .cloned()
            .collect();
        for computation in sourced {
            self.remove_computation(&*computation);
        }
        self.state
            .borrow_mut()
            .display_items
            .retain(|item| item.id() != id);
        tracing::trace!(display_item = %id, "display item removed");
        self.end_removal(id);
    }

    /// Fire about-to-close once. Later calls are no-ops.
    pub fn close(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        tracing::debug!(document = %self.id, "document closing");
        self.about_to_close.notify(&());
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    #[must_use]
    pub fn contains_display_item(&self, id: Uuid) -> bool {
        self.state
            .borrow()
            .display_items
            .iter()
            .any(|item| item.id() == id)
    }

    #[must_use]
    pub fn data_items(&self) -> Vec<Rc<MemoryDataItem>> {
        self.state.borrow().data_items.clone()
    }

    #[must_use]
    pub fn display_items(&self) -> Vec<Rc<MemoryDisplayItem>> {
        self.state.borrow().display_items.clone()
    }

    #[must_use]
    pub fn data_item_count(&self) -> usize {
        self.state.borrow().data_items.len()
    }

    #[must_use]
    pub fn computation_count(&self) -> usize {
        self.state.borrow().computations.len()
    }

    #[must_use]
    pub fn data_structure_count(&self) -> usize {
        self.state.borrow().data_structures.len()
    }

    /// Computations tagged with `processing_id`.
    #[must_use]
    pub fn computations_with(&self, processing_id: &str) -> Vec<Rc<MemoryComputation>> {
        self.state
            .borrow()
            .computations
            .iter()
            .filter(|computation| computation.processing_id() == processing_id)
            .cloned()
            .collect()
    }

    /// Mark `id` as being removed. `false` when a removal is already running.
    pub(crate) fn begin_removal(&self, id: Uuid) -> bool {
        self.removing.borrow_mut().insert(id)
    }

    pub(crate) fn end_removal(&self, id: Uuid) {
        self.removing.borrow_mut().remove(&id);
    }

    /// Drop a removed graphic from every computation that referenced it.
    pub(crate) fn cascade_graphic_removal(&self, graphic_id: Uuid) {
        let computations = self.state.borrow().computations.clone();
        let mut dependents = Vec::new();
        for computation in computations {
            if computation.uses_single_input(graphic_id) {
                dependents.push(computation);
            } else {
                computation.drop_from_object_lists(graphic_id);
            }
        }
        for computation in dependents {
            self.remove_computation(&*computation);
        }
    }

    fn find_data_item(&self, id: Uuid) -> Option<Rc<MemoryDataItem>> {
        self.state
            .borrow()
            .data_items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    fn find_computation(&self, id: Uuid) -> Option<Rc<MemoryComputation>> {
        self.state
            .borrow()
            .computations
            .iter()
            .find(|computation| computation.id() == id)
            .cloned()
    }
}

impl DocumentModel for MemoryDocument {
    fn id(&self) -> Uuid {
        self.id
    }

    fn create_data_item(&self) -> Rc<dyn DataItem> {
        let data_item = MemoryDataItem::new(0, Calibration::identity());
        self.state
            .borrow_mut()
            .pending_data_items
            .push(Rc::clone(&data_item));
        data_item
    }

    fn append_data_item(&self, data_item: &Rc<dyn DataItem>, auto_display: bool) {
        let id = data_item.id();
        let appended = {
            let mut state = self.state.borrow_mut();
            let position = state
                .pending_data_items
                .iter()
                .position(|item| item.id() == id);
            position.map(|position| {
                let item = state.pending_data_items.remove(position);
                state.data_items.push(Rc::clone(&item));
                item
            })
        };
        let Some(item) = appended else {
            tracing::warn!(data_item = %id, "append of a data item this document did not create");
            return;
        };
        tracing::trace!(data_item = %id, auto_display, "data item appended");
        if auto_display {
            let _display_item = self.add_display_item(&item);
        }
    }

    fn remove_data_item(&self, data_item: &dyn DataItem) {
        let id = data_item.id();
        let Some(item) = self.find_data_item(id) else {
            return;
        };
        if !self.begin_removal(id) {
            return;
        }
        item.about_to_be_removed.notify(&());
        for display_item in self.display_items() {
            display_item.detach_data_item(id);
        }
        self.state
            .borrow_mut()
            .data_items
            .retain(|item| item.id() != id);
        tracing::trace!(data_item = %id, "data item removed");

        let dependents: Vec<Rc<MemoryComputation>> = self
            .state
            .borrow()
            .computations
            .iter()
            .filter(|computation| computation.uses_input(id) || computation.produces(id))
            .cloned()
            .collect();
        for computation in dependents {
            self.remove_computation(&*computation);
        }
        self.end_removal(id);
    }

    fn contains_data_item(&self, id: Uuid) -> bool {
        self.find_data_item(id).is_some()
    }

    fn create_computation(
        &self,
        processing_id: &str,
        source: &Rc<dyn DisplayItem>,
    ) -> Rc<dyn Computation> {
        let computation = MemoryComputation::new(processing_id, Some(source.id()));
        self.state
            .borrow_mut()
            .pending_computations
            .push(Rc::clone(&computation));
        computation
    }

    fn append_computation(&self, computation: &Rc<dyn Computation>) {
        let id = computation.id();
        let appended = {
            let mut state = self.state.borrow_mut();
            let position = state
                .pending_computations
                .iter()
                .position(|pending| pending.id() == id);
            position.map(|position| {
                let pending = state.pending_computations.remove(position);
                state.computations.push(pending);
            })
        };
        if appended.is_none() {
            tracing::warn!(computation = %id, "append of a computation this document did not create");
            return;
        }
        tracing::trace!(computation = %id, processing_id = %computation.processing_id(), "computation appended");
    }

    fn remove_computation(&self, computation: &dyn Computation) {
        let id = computation.id();
        let Some(computation) = self.find_computation(id) else {
            return;
        };
        if !self.begin_removal(id) {
            return;
        }
        computation.about_to_be_removed.notify(&());
        self.state
            .borrow_mut()
            .computations
            .retain(|candidate| candidate.id() != id);
        tracing::trace!(computation = %id, "computation removed");
        for result in computation.result_items() {
            self.remove_data_item(&*result);
        }
        self.end_removal(id);
    }

    fn contains_computation(&self, id: Uuid) -> bool {
        self.find_computation(id).is_some()
    }

    fn computations(&self) -> Vec<Rc<dyn Computation>> {
        self.state
            .borrow()
            .computations
            .iter()
            .map(|computation| Rc::clone(computation) as Rc<dyn Computation>)
            .collect()
    }

    fn create_data_structure(
        &self,
        structure_type: &str,
        source: Option<&Rc<dyn DataStructure>>,
    ) -> Rc<dyn DataStructure> {
        let structure = MemoryDataStructure::new(structure_type, source.map(|s| s.id()));
        self.state
            .borrow_mut()
            .pending_data_structures
            .push(Rc::clone(&structure));
        structure
    }

    fn append_data_structure(&self, data_structure: &Rc<dyn DataStructure>) {
        let id = data_structure.id();
        let index = {
            let mut state = self.state.borrow_mut();
            let position = state
                .pending_data_structures
                .iter()
                .position(|pending| pending.id() == id);
            position.map(|position| {
                let pending = state.pending_data_structures.remove(position);
                state.data_structures.push(pending);
                state.data_structures.len() - 1
            })
        };
        let Some(index) = index else {
            tracing::warn!(record = %id, "append of a record this document did not create");
            return;
        };
        tracing::debug!(record = %id, structure_type = %data_structure.structure_type(), index, "record inserted");
        self.data_structure_inserted
            .notify(&(Rc::clone(data_structure), index));
    }

    fn remove_data_structure(&self, data_structure: &dyn DataStructure) {
        let id = data_structure.id();
        let present = self
            .state
            .borrow()
            .data_structures
            .iter()
            .any(|candidate| candidate.id() == id);
        if !present || !self.begin_removal(id) {
            return;
        }

        let dependents: Vec<Rc<MemoryDataStructure>> = self
            .state
            .borrow()
            .data_structures
            .iter()
            .filter(|candidate| candidate.source_id() == Some(id))
            .cloned()
            .collect();
        for dependent in dependents {
            self.remove_data_structure(&*dependent);
        }

        let structure = self
            .state
            .borrow()
            .data_structures
            .iter()
            .find(|candidate| candidate.id() == id)
            .cloned();
        if let Some(structure) = &structure {
            structure.about_to_be_removed.notify(&());
        }

        // Dependents and listeners may have shifted the index; look it up again.
        let removed = {
            let mut state = self.state.borrow_mut();
            let position = state
                .data_structures
                .iter()
                .position(|candidate| candidate.id() == id);
            position.map(|index| (state.data_structures.remove(index), index))
        };
        if let Some((structure, index)) = removed {
            tracing::debug!(record = %id, index, "record removed");
            self.data_structure_removed
                .notify(&(structure as Rc<dyn DataStructure>, index));
        }
        self.end_removal(id);
    }

    fn data_structures(&self) -> Vec<Rc<dyn DataStructure>> {
        self.state
            .borrow()
            .data_structures
            .iter()
            .map(|structure| Rc::clone(structure) as Rc<dyn DataStructure>)
            .collect()
    }

    fn on_data_structure_inserted(&self, callback: RecordCallback) -> Subscription {
        self.data_structure_inserted
            .subscribe(move |(structure, index)| callback(structure, *index))
    }

    fn on_data_structure_removed(&self, callback: RecordCallback) -> Subscription {
        self.data_structure_removed
            .subscribe(move |(structure, index)| callback(structure, *index))
    }

    fn on_about_to_close(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_close.subscribe(move |()| callback())
    }
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryDocument")
            .field("id", &self.id)
            .field("data_items", &state.data_items.len())
            .field("display_items", &state.display_items.len())
            .field("computations", &state.computations.len())
            .field("data_structures", &state.data_structures.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::items::IntervalGraphic;
    use crate::object::HostObjectRef;

    fn spectrum(document: &Rc<MemoryDocument>) -> (Rc<MemoryDataItem>, Rc<MemoryDisplayItem>) {
        let data_item = document.add_data_item(2048, Calibration::identity(), "EELS");
        let display_item = document.add_display_item(&data_item);
        (data_item, display_item)
    }

    fn appended_computation(
        document: &Rc<MemoryDocument>,
        display_item: &Rc<MemoryDisplayItem>,
    ) -> Rc<dyn Computation> {
        let source: Rc<dyn DisplayItem> = Rc::clone(display_item) as Rc<dyn DisplayItem>;
        let computation = document.create_computation("test.processing", &source);
        document.append_computation(&computation);
        computation
    }

    #[test]
    fn created_objects_join_the_document_on_append() {
        let document = MemoryDocument::new();
        let data_item = document.create_data_item();
        assert!(!document.contains_data_item(data_item.id()));
        document.append_data_item(&data_item, false);
        assert!(document.contains_data_item(data_item.id()));
        assert!(document.display_items().is_empty());

        let shown = document.create_data_item();
        document.append_data_item(&shown, true);
        assert_eq!(document.display_items().len(), 1);
    }

    #[test]
    fn removing_a_graphic_drops_it_from_object_lists() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let kept = display_item.add_interval_graphic();
        let removed = display_item.add_interval_graphic();
        let computation = appended_computation(&document, &display_item);
        computation.create_objects(
            "graphics",
            vec![
                HostObjectRef::Graphic(Rc::clone(&kept)),
                HostObjectRef::Graphic(Rc::clone(&removed)),
            ],
        );

        display_item.remove_graphic(&*removed);

        assert_eq!(display_item.graphic_count(), 1);
        assert!(document.contains_computation(computation.id()));
        assert_eq!(
            computation.objects("graphics"),
            vec![HostObjectRef::Graphic(kept)]
        );
    }

    #[test]
    fn removing_a_single_input_graphic_removes_the_computation_and_results() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let graphic = display_item.add_interval_graphic();
        let result = document.create_data_item();
        document.append_data_item(&result, false);
        let computation = appended_computation(&document, &display_item);
        computation.create_object("signal", HostObjectRef::Graphic(Rc::clone(&graphic)));
        computation.create_result("out", Rc::clone(&result));

        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let _sub = computation.on_about_to_be_removed(Box::new(move || {
            counter.set(counter.get() + 1);
        }));

        display_item.remove_graphic(&*graphic);

        assert_eq!(fired.get(), 1);
        assert!(!document.contains_computation(computation.id()));
        assert!(!document.contains_data_item(result.id()));
    }

    #[test]
    fn removing_a_result_removes_its_computation_once() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let first = document.create_data_item();
        let second = document.create_data_item();
        document.append_data_item(&first, false);
        document.append_data_item(&second, false);
        let computation = appended_computation(&document, &display_item);
        computation.create_result("a", Rc::clone(&first));
        computation.create_result("b", Rc::clone(&second));

        document.remove_data_item(&*first);

        assert_eq!(document.computation_count(), 0);
        assert!(!document.contains_data_item(second.id()));
        assert_eq!(document.data_item_count(), 1);
    }

    #[test]
    fn removal_of_absent_objects_is_a_no_op() {
        let document = MemoryDocument::new();
        let (data_item, display_item) = spectrum(&document);
        let graphic = display_item.add_interval_graphic();
        display_item.remove_graphic(&*graphic);
        display_item.remove_graphic(&*graphic);
        document.remove_data_item(&*data_item);
        document.remove_data_item(&*data_item);
        let pending = document.create_data_item();
        document.remove_data_item(&*pending);
        assert_eq!(document.data_item_count(), 0);
    }

    #[test]
    fn removing_a_data_item_detaches_display_channels() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let overlay = document.add_data_item(2048, Calibration::identity(), "Overlay");
        let index = display_item.append_display_data_channel(Rc::clone(&overlay) as Rc<dyn DataItem>);
        display_item.insert_display_layer(
            0,
            crate::items::DisplayLayer {
                data_index: index,
                label: Some("Overlay".into()),
                fill_color: None,
            },
        );
        assert_eq!(display_item.display_layers().len(), 2);

        document.remove_data_item(&*overlay);

        assert_eq!(display_item.data_channel_count(), 1);
        assert_eq!(display_item.display_layers().len(), 1);
    }

    #[test]
    fn removing_a_display_item_cascades() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let graphic = display_item.add_interval_graphic();
        let graphic_removed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&graphic_removed);
        let _sub = graphic.on_about_to_be_removed(Box::new(move || flag.set(true)));
        let _computation = appended_computation(&document, &display_item);

        document.remove_display_item(&display_item);

        assert!(graphic_removed.get());
        assert_eq!(document.computation_count(), 0);
        assert!(document.display_items().is_empty());
    }

    #[test]
    fn record_events_carry_the_index() {
        let document = MemoryDocument::new();
        let inserted = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&inserted);
        let _a = document.on_data_structure_inserted(Box::new(move |record: &Rc<dyn DataStructure>, index: usize| {
            sink.borrow_mut().push((record.structure_type(), index));
        }));
        let sink = Rc::clone(&removed);
        let _b = document.on_data_structure_removed(Box::new(move |record: &Rc<dyn DataStructure>, index: usize| {
            sink.borrow_mut().push((record.structure_type(), index));
        }));

        let first = document.create_data_structure("a", None);
        document.append_data_structure(&first);
        let second = document.create_data_structure("b", None);
        document.append_data_structure(&second);
        document.remove_data_structure(&*first);
        document.remove_data_structure(&*first);

        assert_eq!(
            *inserted.borrow(),
            vec![("a".to_owned(), 0), ("b".to_owned(), 1)]
        );
        assert_eq!(*removed.borrow(), vec![("a".to_owned(), 0)]);
    }

    #[test]
    fn removing_a_record_removes_records_sourced_on_it() {
        let document = MemoryDocument::new();
        let parent = document.create_data_structure("parent", None);
        document.append_data_structure(&parent);
        let child = document.create_data_structure("child", Some(&parent));
        document.append_data_structure(&child);
        assert_eq!(child.source_id(), Some(parent.id()));

        document.remove_data_structure(&*parent);

        assert_eq!(document.data_structure_count(), 0);
    }

    #[test]
    fn record_is_still_listed_while_about_to_be_removed() {
        let document = MemoryDocument::new();
        let record = document.create_data_structure("a", None);
        document.append_data_structure(&record);
        let listed = Rc::new(Cell::new(None));
        let _sub = {
            let listed = Rc::clone(&listed);
            let weak = Rc::downgrade(&document);
            let id = record.id();
            record.on_about_to_be_removed(Box::new(move || {
                if let Some(document) = weak.upgrade() {
                    let present = document
                        .data_structures()
                        .iter()
                        .any(|candidate| candidate.id() == id);
                    listed.set(Some(present));
                }
            }))
        };

        document.remove_data_structure(&*record);

        assert_eq!(listed.get(), Some(true));
        assert_eq!(document.data_structure_count(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn appending_a_foreign_record_is_ignored() {
        let document = MemoryDocument::new();
        let other = MemoryDocument::new();
        let foreign = other.create_data_structure("x", None);
        document.append_data_structure(&foreign);
        assert_eq!(document.data_structure_count(), 0);
        assert!(logs_contain("did not create"));
    }

    #[test]
    fn close_fires_once() {
        let document = MemoryDocument::new();
        let closes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closes);
        let _sub = document.on_about_to_close(Box::new(move || counter.set(counter.get() + 1)));
        document.close();
        document.close();
        assert_eq!(closes.get(), 1);
        assert!(document.is_closed());
    }

    #[test]
    fn graphic_set_interval_notifies_only_on_change() {
        let document = MemoryDocument::new();
        let (_, display_item) = spectrum(&document);
        let graphic = display_item.add_interval_graphic();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = graphic.on_property_changed(Box::new(move |name: &str| {
            sink.borrow_mut().push(name.to_owned());
        }));
        graphic.set_interval((0.2, 0.3));
        graphic.set_interval((0.2, 0.3));
        assert_eq!(*seen.borrow(), vec!["interval".to_owned()]);
        assert_eq!(display_item.interval_graphics()[0].write_count(), 1);
    }
}
