#![forbid(unsafe_code)]

//! The persisted, observable collection of edges.
//!
//! An [`EelsQuantification`] owns its edges and mirrors them into one
//! document record under the `eels_edges` property. The record is rewritten
//! synchronously after every insert, remove and every mutation of an owned
//! edge, so the record and the in-memory list agree whenever a call returns.
//!
//! # Invariants
//!
//! 1. Edge UUIDs are unique within a quantification.
//! 2. Insert/remove notifications fire before the record is rewritten.
//! 3. Once detached (record removed), the list still works but nothing is
//!    written.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{
    EdgeRecord, EelsEdge, EelsError, Event, ListChange, Subscription, SubscriptionScope,
};
use eels_host::{DataStructure, DocumentModel};
use uuid::Uuid;

use crate::error::Result;

/// Record property holding the persisted edge list.
pub const EELS_EDGES: &str = "eels_edges";

struct EdgeEntry {
    edge: Rc<EelsEdge>,
    // Rewrites the record whenever the edge changes.
    _persistence: SubscriptionScope,
}

/// An ordered set of edges backed by a document record.
pub struct EelsQuantification {
    this: Weak<Self>,
    document: Rc<dyn DocumentModel>,
    record_id: Uuid,
    record: RefCell<Option<Rc<dyn DataStructure>>>,
    edges: RefCell<Vec<EdgeEntry>>,
    edge_inserted: Event<ListChange<Rc<EelsEdge>>>,
    edge_removed: Event<ListChange<Rc<EelsEdge>>>,
}

impl EelsQuantification {
    /// Load the quantification stored in `record`.
    pub fn new(document: Rc<dyn DocumentModel>, record: Rc<dyn DataStructure>) -> Result<Rc<Self>> {
        let records: Vec<EdgeRecord> = match record.property(EELS_EDGES) {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        let mut edges: Vec<Rc<EelsEdge>> = Vec::with_capacity(records.len());
        for edge_record in records {
            let edge = Rc::new(EelsEdge::from_record(edge_record));
            if edges.iter().any(|existing| existing.uuid() == edge.uuid()) {
                return Err(EelsError::DuplicateEdge(edge.uuid()).into());
            }
            edges.push(edge);
        }
        let record_id = record.id();
        tracing::debug!(record = %record_id, edges = edges.len(), "quantification loaded");

        Ok(Rc::new_cyclic(|this: &Weak<Self>| {
            let entries = edges
                .into_iter()
                .map(|edge| Self::entry(this, edge))
                .collect();
            Self {
                this: this.clone(),
                document,
                record_id,
                record: RefCell::new(Some(record)),
                edges: RefCell::new(entries),
                edge_inserted: Event::new(),
                edge_removed: Event::new(),
            }
        }))
    }

    fn entry(this: &Weak<Self>, edge: Rc<EelsEdge>) -> EdgeEntry {
        let mut persistence = SubscriptionScope::new();
        let weak = this.clone();
        persistence.hold(edge.on_property_changed(move |_| Self::write_through(&weak)));
        let weak = this.clone();
        persistence.hold(edge.on_item_inserted(move |_| Self::write_through(&weak)));
        let weak = this.clone();
        persistence.hold(edge.on_item_removed(move |_| Self::write_through(&weak)));
        let weak = this.clone();
        persistence.hold(edge.on_item_value_changed(move |_| Self::write_through(&weak)));
        EdgeEntry {
            edge,
            _persistence: persistence,
        }
    }

    fn write_through(this: &Weak<Self>) {
        if let Some(this) = this.upgrade() {
            if let Err(err) = this.write() {
                tracing::error!(record = %this.record_id, %err, "failed to persist edges");
            }
        }
    }

    /// Rewrite the full edge list into the record.
    fn write(&self) -> Result<()> {
        let Some(record) = self.record.borrow().clone() else {
            return Ok(());
        };
        let records: Vec<EdgeRecord> = self
            .edges
            .borrow()
            .iter()
            .map(|entry| entry.edge.to_record())
            .collect();
        record.set_property(EELS_EDGES, serde_json::to_value(records)?);
        Ok(())
    }

    #[must_use]
    pub fn document(&self) -> &Rc<dyn DocumentModel> {
        &self.document
    }

    /// The backing record, or `None` once it was removed.
    #[must_use]
    pub fn data_structure(&self) -> Option<Rc<dyn DataStructure>> {
        self.record.borrow().clone()
    }

    /// Identity of the backing record, kept after detaching.
    #[must_use]
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.record.borrow().is_none()
    }

    #[must_use]
    pub fn eels_edges(&self) -> Vec<Rc<EelsEdge>> {
        self.edges
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.edge))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.borrow().is_empty()
    }

    #[must_use]
    pub fn get_eels_edge_from_uuid(&self, uuid: Uuid) -> Option<Rc<EelsEdge>> {
        self.edges
            .borrow()
            .iter()
            .find(|entry| entry.edge.uuid() == uuid)
            .map(|entry| Rc::clone(&entry.edge))
    }

    /// Position of `edge` in the list.
    #[must_use]
    pub fn index_of(&self, edge: &EelsEdge) -> Option<usize> {
        self.edges
            .borrow()
            .iter()
            .position(|entry| entry.edge.uuid() == edge.uuid())
    }

    pub fn insert_edge(&self, index: usize, edge: Rc<EelsEdge>) -> Result<()> {
        {
            let mut edges = self.edges.borrow_mut();
            if edges.iter().any(|entry| entry.edge.uuid() == edge.uuid()) {
                return Err(EelsError::DuplicateEdge(edge.uuid()).into());
            }
            if index > edges.len() {
                return Err(EelsError::IndexOutOfRange {
                    index,
                    len: edges.len(),
                }
                .into());
            }
            edges.insert(index, Self::entry(&self.this, Rc::clone(&edge)));
        }
        tracing::debug!(record = %self.record_id, edge = %edge.uuid(), index, "edge inserted");
        self.edge_inserted.notify(&ListChange {
            key: EELS_EDGES,
            item: edge,
            index,
        });
        self.write()
    }

    pub fn append_edge(&self, edge: Rc<EelsEdge>) -> Result<()> {
        let index = self.len();
        self.insert_edge(index, edge)
    }

    pub fn remove_edge(&self, index: usize) -> Result<Rc<EelsEdge>> {
        let entry = {
            let mut edges = self.edges.borrow_mut();
            if index >= edges.len() {
                return Err(EelsError::IndexOutOfRange {
                    index,
                    len: edges.len(),
                }
                .into());
            }
            edges.remove(index)
        };
        let edge = Rc::clone(&entry.edge);
        drop(entry);
        tracing::debug!(record = %self.record_id, edge = %edge.uuid(), index, "edge removed");
        self.edge_removed.notify(&ListChange {
            key: EELS_EDGES,
            item: Rc::clone(&edge),
            index,
        });
        self.write()?;
        Ok(edge)
    }

    /// Remove every edge (last first, each notified), then the record.
    pub fn destroy(&self) {
        loop {
            let entry = self.edges.borrow_mut().pop();
            let Some(entry) = entry else {
                break;
            };
            let index = self.len();
            let edge = Rc::clone(&entry.edge);
            drop(entry);
            self.edge_removed.notify(&ListChange {
                key: EELS_EDGES,
                item: edge,
                index,
            });
        }
        let record = self.record.borrow_mut().take();
        if let Some(record) = record {
            tracing::debug!(record = %self.record_id, "quantification destroyed");
            self.document.remove_data_structure(&*record);
        }
    }

    /// The record was removed by someone else; stop writing to it.
    pub fn data_structure_deleted(&self) {
        self.record.borrow_mut().take();
    }

    pub fn on_edge_inserted(
        &self,
        callback: impl Fn(&ListChange<Rc<EelsEdge>>) + 'static,
    ) -> Subscription {
        self.edge_inserted.subscribe(callback)
    }

    pub fn on_edge_removed(
        &self,
        callback: impl Fn(&ListChange<Rc<EelsEdge>>) + 'static,
    ) -> Subscription {
        self.edge_removed.subscribe(callback)
    }
}

impl fmt::Debug for EelsQuantification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EelsQuantification")
            .field("record", &self.record_id)
            .field("detached", &self.is_detached())
            .field("edges", &self.len())
            .finish()
    }
}
