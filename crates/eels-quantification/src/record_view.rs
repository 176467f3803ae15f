#![forbid(unsafe_code)]

//! A live view over the document's records of one type.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use eels_core::{Event, Subscription, SubscriptionScope};
use eels_host::{DataStructure, DocumentModel};

/// A record entering or leaving a [`RecordView`], with its index in the view.
#[derive(Clone)]
pub struct RecordChange {
    pub record: Rc<dyn DataStructure>,
    pub index: usize,
}

impl fmt::Debug for RecordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordChange")
            .field("record", &self.record.id())
            .field("index", &self.index)
            .finish()
    }
}

struct ViewState {
    structure_type: String,
    items: RefCell<Vec<Rc<dyn DataStructure>>>,
    inserted: Event<RecordChange>,
    removed: Event<RecordChange>,
}

impl ViewState {
    fn record_inserted(&self, record: &Rc<dyn DataStructure>) {
        if record.structure_type() != self.structure_type {
            return;
        }
        let index = {
            let mut items = self.items.borrow_mut();
            if items.iter().any(|item| item.id() == record.id()) {
                return;
            }
            items.push(Rc::clone(record));
            items.len() - 1
        };
        tracing::debug!(kind = %self.structure_type, record = %record.id(), index, "record inserted");
        self.inserted.notify(&RecordChange {
            record: Rc::clone(record),
            index,
        });
    }

    fn record_removed(&self, record: &Rc<dyn DataStructure>) {
        let removed = {
            let mut items = self.items.borrow_mut();
            items
                .iter()
                .position(|item| item.id() == record.id())
                .map(|index| (index, items.remove(index)))
        };
        let Some((index, record)) = removed else {
            return;
        };
        tracing::debug!(kind = %self.structure_type, record = %record.id(), index, "record removed");
        self.removed.notify(&RecordChange { record, index });
    }
}

/// The records of one `structure_type`, in insertion order, kept current as
/// the document changes.
pub struct RecordView {
    state: Rc<ViewState>,
    subscriptions: SubscriptionScope,
}

impl RecordView {
    pub fn new(document: &dyn DocumentModel, structure_type: &str) -> Self {
        let items = document
            .data_structures()
            .into_iter()
            .filter(|record| record.structure_type() == structure_type)
            .collect();
        let state = Rc::new(ViewState {
            structure_type: structure_type.to_owned(),
            items: RefCell::new(items),
            inserted: Event::new(),
            removed: Event::new(),
        });

        let mut subscriptions = SubscriptionScope::new();
        {
            let weak = Rc::downgrade(&state);
            subscriptions.hold(document.on_data_structure_inserted(Box::new(
                move |record: &Rc<dyn DataStructure>, _index: usize| {
                    if let Some(state) = weak.upgrade() {
                        state.record_inserted(record);
                    }
                },
            )));
        }
        {
            let weak = Rc::downgrade(&state);
            subscriptions.hold(document.on_data_structure_removed(Box::new(
                move |record: &Rc<dyn DataStructure>, _index: usize| {
                    if let Some(state) = weak.upgrade() {
                        state.record_removed(record);
                    }
                },
            )));
        }
        Self {
            state,
            subscriptions,
        }
    }

    #[must_use]
    pub fn structure_type(&self) -> &str {
        &self.state.structure_type
    }

    #[must_use]
    pub fn items(&self) -> Vec<Rc<dyn DataStructure>> {
        self.state.items.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.items.borrow().is_empty()
    }

    pub fn on_item_inserted(&self, callback: impl Fn(&RecordChange) + 'static) -> Subscription {
        self.state.inserted.subscribe(callback)
    }

    pub fn on_item_removed(&self, callback: impl Fn(&RecordChange) + 'static) -> Subscription {
        self.state.removed.subscribe(callback)
    }

    /// Stop following the document. The current items are kept.
    pub fn close(&mut self) {
        self.subscriptions.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl fmt::Debug for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordView")
            .field("structure_type", &self.state.structure_type)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use eels_host::memory::MemoryDocument;

    use super::*;

    const KIND: &str = "nion.eels_quantification";

    fn append(document: &MemoryDocument, kind: &str) -> Rc<dyn DataStructure> {
        let record = document.create_data_structure(kind, None);
        document.append_data_structure(&record);
        record
    }

    #[test]
    fn existing_records_of_the_type_are_listed() {
        let document = MemoryDocument::new();
        let first = append(&document, KIND);
        append(&document, "other");
        let view = RecordView::new(&*document, KIND);
        assert_eq!(view.len(), 1);
        assert_eq!(view.items()[0].id(), first.id());
    }

    #[test]
    fn inserts_and_removals_are_followed() {
        let document = MemoryDocument::new();
        let view = RecordView::new(&*document, KIND);
        let inserted = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let _on_insert = {
            let inserted = Rc::clone(&inserted);
            view.on_item_inserted(move |change| inserted.borrow_mut().push(change.index))
        };
        let _on_remove = {
            let removed = Rc::clone(&removed);
            view.on_item_removed(move |change| removed.borrow_mut().push(change.index))
        };

        let first = append(&document, KIND);
        append(&document, "other");
        let second = append(&document, KIND);
        document.remove_data_structure(&*first);

        assert_eq!(*inserted.borrow(), vec![0, 1]);
        assert_eq!(*removed.borrow(), vec![0]);
        assert_eq!(view.len(), 1);
        assert_eq!(view.items()[0].id(), second.id());
    }

    #[test]
    fn closed_view_stops_following() {
        let document = MemoryDocument::new();
        let mut view = RecordView::new(&*document, KIND);
        let notified = Rc::new(Cell::new(0));
        let _sub = {
            let notified = Rc::clone(&notified);
            view.on_item_inserted(move |_| notified.set(notified.get() + 1))
        };
        view.close();
        view.close();
        append(&document, KIND);
        assert!(view.is_closed());
        assert!(view.is_empty());
        assert_eq!(notified.get(), 0);
    }
}
