#![forbid(unsafe_code)]

//! Per-document owner of quantifications and their displays.
//!
//! An [`EelsQuantificationManager`] mirrors two record views into live
//! objects:
//!
//! ```text
//!   records "nion.eels_quantification"          -> EelsQuantification
//!   records "nion.eels_quantification_display"  -> EelsQuantificationDisplay
//!                                                  (source = quantification)
//! ```
//!
//! Records are the source of truth. `create_*` appends a record and lets the
//! view build the object; `destroy_*` removes the record and lets the view
//! tear the object down. Records removed by anyone else (undo, another
//! plugin, document cleanup) take the same path.
//!
//! [`ManagerRegistry`] hands out one manager per document and drops it when
//! the document closes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{Subscription, SubscriptionScope};
use eels_host::{DataItem, DataStructure, DisplayItem, DocumentModel, HostObjectRef};
use uuid::Uuid;

use crate::config::QuantificationConfig;
use crate::error::{QuantificationError, Result};
use crate::quantification::EelsQuantification;
use crate::quantification_display::{
    EELS_DATA_ITEM, EELS_DISPLAY_ITEM, EelsQuantificationDisplay, ShouldRemove,
};
use crate::record_view::{RecordChange, RecordView};

/// Quantifications and displays of one document.
pub struct EelsQuantificationManager {
    this: Weak<Self>,
    document: Rc<dyn DocumentModel>,
    config: Rc<QuantificationConfig>,
    quantification_records: RefCell<RecordView>,
    display_records: RefCell<RecordView>,
    quantifications: RefCell<Vec<Rc<EelsQuantification>>>,
    displays: RefCell<Vec<Rc<EelsQuantificationDisplay>>>,
    subscriptions: RefCell<SubscriptionScope>,
}

impl EelsQuantificationManager {
    /// Build the manager and load every record already in `document`.
    pub fn new(document: Rc<dyn DocumentModel>, config: Rc<QuantificationConfig>) -> Rc<Self> {
        let quantification_records =
            RecordView::new(document.as_ref(), &config.quantification_structure_type);
        let display_records = RecordView::new(document.as_ref(), &config.display_structure_type);
        let manager = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            document,
            config,
            quantification_records: RefCell::new(quantification_records),
            display_records: RefCell::new(display_records),
            quantifications: RefCell::new(Vec::new()),
            displays: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(SubscriptionScope::new()),
        });
        manager.subscribe();

        let records = manager.quantification_records.borrow().items();
        for record in &records {
            manager.quantification_inserted(record);
        }
        let records = manager.display_records.borrow().items();
        for record in &records {
            manager.display_inserted(record);
        }
        tracing::debug!(
            document = %manager.document.id(),
            quantifications = manager.quantifications.borrow().len(),
            displays = manager.displays.borrow().len(),
            "quantification manager created"
        );
        manager
    }

    fn subscribe(&self) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let quantification_records = self.quantification_records.borrow();
        let display_records = self.display_records.borrow();

        let weak = self.this.clone();
        subscriptions.hold(quantification_records.on_item_inserted(move |change: &RecordChange| {
            if let Some(this) = weak.upgrade() {
                this.quantification_inserted(&change.record);
            }
        }));
        let weak = self.this.clone();
        subscriptions.hold(quantification_records.on_item_removed(move |change: &RecordChange| {
            if let Some(this) = weak.upgrade() {
                this.quantification_removed(&change.record);
            }
        }));
        let weak = self.this.clone();
        subscriptions.hold(display_records.on_item_inserted(move |change: &RecordChange| {
            if let Some(this) = weak.upgrade() {
                this.display_inserted(&change.record);
            }
        }));
        let weak = self.this.clone();
        subscriptions.hold(display_records.on_item_removed(move |change: &RecordChange| {
            if let Some(this) = weak.upgrade() {
                this.display_removed(&change.record);
            }
        }));
    }

    fn quantification_inserted(&self, record: &Rc<dyn DataStructure>) {
        if self.find_quantification(record.id()).is_some() {
            return;
        }
        match EelsQuantification::new(Rc::clone(&self.document), Rc::clone(record)) {
            Ok(quantification) => self.quantifications.borrow_mut().push(quantification),
            Err(err) => {
                tracing::error!(record = %record.id(), %err, "quantification record cannot be loaded");
            }
        }
    }

    fn quantification_removed(&self, record: &Rc<dyn DataStructure>) {
        let Some(quantification) = self.find_quantification(record.id()) else {
            return;
        };
        quantification.data_structure_deleted();
        self.destroy_eels_quantification(&quantification);
        self.quantifications
            .borrow_mut()
            .retain(|q| !Rc::ptr_eq(q, &quantification));
    }

    fn display_inserted(&self, record: &Rc<dyn DataStructure>) {
        if self.find_display(record.id()).is_some() {
            return;
        }
        let quantification = record
            .source_id()
            .and_then(|source_id| self.find_quantification(source_id));
        let Some(quantification) = quantification else {
            tracing::warn!(record = %record.id(), "display record has no quantification, skipping");
            return;
        };
        match EelsQuantificationDisplay::new(
            quantification,
            Rc::clone(record),
            Rc::clone(&self.config),
            Some(self.should_remove_callback()),
        ) {
            Ok(display) => self.displays.borrow_mut().push(display),
            Err(err) => {
                tracing::error!(record = %record.id(), %err, "display record cannot be loaded");
            }
        }
    }

    fn should_remove_callback(&self) -> ShouldRemove {
        let weak = self.this.clone();
        Rc::new(move |display: &Rc<EelsQuantificationDisplay>| {
            let Some(this) = weak.upgrade() else {
                return;
            };
            if this.find_display(display.record_id()).is_some() {
                this.destroy_eels_quantification_display(display);
            }
        })
    }

    fn display_removed(&self, record: &Rc<dyn DataStructure>) {
        let removed = {
            let mut displays = self.displays.borrow_mut();
            displays
                .iter()
                .position(|display| display.record_id() == record.id())
                .map(|index| displays.remove(index))
        };
        let Some(display) = removed else {
            return;
        };
        display.data_structure_deleted();
        display.destroy();
        display.close();
    }

    fn find_quantification(&self, record_id: Uuid) -> Option<Rc<EelsQuantification>> {
        self.quantifications
            .borrow()
            .iter()
            .find(|q| q.record_id() == record_id)
            .cloned()
    }

    fn find_display(&self, record_id: Uuid) -> Option<Rc<EelsQuantificationDisplay>> {
        self.displays
            .borrow()
            .iter()
            .find(|display| display.record_id() == record_id)
            .cloned()
    }

    #[must_use]
    pub fn document(&self) -> &Rc<dyn DocumentModel> {
        &self.document
    }

    #[must_use]
    pub fn config(&self) -> &Rc<QuantificationConfig> {
        &self.config
    }

    #[must_use]
    pub fn eels_quantifications(&self) -> Vec<Rc<EelsQuantification>> {
        self.quantifications.borrow().clone()
    }

    #[must_use]
    pub fn eels_quantification_displays(&self) -> Vec<Rc<EelsQuantificationDisplay>> {
        self.displays.borrow().clone()
    }

    /// Displays belonging to `quantification`.
    #[must_use]
    pub fn get_eels_quantification_displays(
        &self,
        quantification: &Rc<EelsQuantification>,
    ) -> Vec<Rc<EelsQuantificationDisplay>> {
        self.displays
            .borrow()
            .iter()
            .filter(|display| Rc::ptr_eq(display.quantification(), quantification))
            .cloned()
            .collect()
    }

    /// Append an empty quantification record and return its quantification.
    pub fn create_eels_quantification(&self) -> Result<Rc<EelsQuantification>> {
        let record = self
            .document
            .create_data_structure(&self.config.quantification_structure_type, None);
        self.document.append_data_structure(&record);
        if let Some(quantification) = self.find_quantification(record.id()) {
            return Ok(quantification);
        }
        // The view is closed or missed the insert.
        let quantification = EelsQuantification::new(Rc::clone(&self.document), record)?;
        self.quantifications
            .borrow_mut()
            .push(Rc::clone(&quantification));
        Ok(quantification)
    }

    /// Destroy the quantification's displays, then the quantification and
    /// its record.
    pub fn destroy_eels_quantification(&self, quantification: &Rc<EelsQuantification>) {
        for display in self.get_eels_quantification_displays(quantification) {
            self.destroy_eels_quantification_display(&display);
        }
        quantification.destroy();
        self.quantifications
            .borrow_mut()
            .retain(|q| !Rc::ptr_eq(q, quantification));
    }

    /// Append a display record for `quantification` on `display_item`
    /// showing `data_item`, and return its display.
    pub fn create_eels_quantification_display(
        &self,
        quantification: &Rc<EelsQuantification>,
        display_item: &Rc<dyn DisplayItem>,
        data_item: &Rc<dyn DataItem>,
    ) -> Result<Rc<EelsQuantificationDisplay>> {
        let source = quantification
            .data_structure()
            .ok_or(QuantificationError::Detached)?;
        let record = self
            .document
            .create_data_structure(&self.config.display_structure_type, Some(&source));
        record.set_referenced_object(
            EELS_DISPLAY_ITEM,
            Some(HostObjectRef::DisplayItem(Rc::clone(display_item))),
        );
        record.set_referenced_object(
            EELS_DATA_ITEM,
            Some(HostObjectRef::DataItem(Rc::clone(data_item))),
        );
        self.document.append_data_structure(&record);
        if let Some(display) = self.find_display(record.id()) {
            return Ok(display);
        }
        let display = EelsQuantificationDisplay::new(
            Rc::clone(quantification),
            record,
            Rc::clone(&self.config),
            Some(self.should_remove_callback()),
        )?;
        self.displays.borrow_mut().push(Rc::clone(&display));
        Ok(display)
    }

    /// Hide every edge of `display` and remove its record.
    pub fn destroy_eels_quantification_display(&self, display: &Rc<EelsQuantificationDisplay>) {
        display.destroy();
        display.close();
        self.displays
            .borrow_mut()
            .retain(|shown| !Rc::ptr_eq(shown, display));
    }

    /// Detach from the document. Records and host artifacts stay.
    pub fn close(&self) {
        self.subscriptions.borrow_mut().clear();
        self.quantification_records.borrow_mut().close();
        self.display_records.borrow_mut().close();
        let displays = std::mem::take(&mut *self.displays.borrow_mut());
        for display in &displays {
            display.close();
        }
        self.quantifications.borrow_mut().clear();
        tracing::debug!(document = %self.document.id(), "quantification manager closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }
}

impl fmt::Debug for EelsQuantificationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EelsQuantificationManager")
            .field("document", &self.document.id())
            .field("quantifications", &self.quantifications.borrow().len())
            .field("displays", &self.displays.borrow().len())
            .finish()
    }
}

struct RegistryEntry {
    manager: Rc<EelsQuantificationManager>,
    _close: Subscription,
}

struct RegistryInner {
    config: Rc<QuantificationConfig>,
    managers: RefCell<HashMap<Uuid, RegistryEntry>>,
}

/// One [`EelsQuantificationManager`] per open document.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct ManagerRegistry {
    inner: Rc<RegistryInner>,
}

impl ManagerRegistry {
    #[must_use]
    pub fn new(config: QuantificationConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                config: Rc::new(config),
                managers: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// The manager of `document`, created on first request. It is closed
    /// and forgotten when the document closes.
    pub fn get_instance(&self, document: &Rc<dyn DocumentModel>) -> Rc<EelsQuantificationManager> {
        let id = document.id();
        if let Some(entry) = self.inner.managers.borrow().get(&id) {
            return Rc::clone(&entry.manager);
        }
        let manager =
            EelsQuantificationManager::new(Rc::clone(document), Rc::clone(&self.inner.config));
        let weak = Rc::downgrade(&self.inner);
        let close = document.on_about_to_close(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let entry = inner.managers.borrow_mut().remove(&id);
            if let Some(entry) = entry {
                entry.manager.close();
            }
        }));
        self.inner.managers.borrow_mut().insert(
            id,
            RegistryEntry {
                manager: Rc::clone(&manager),
                _close: close,
            },
        );
        manager
    }

    #[must_use]
    pub fn contains(&self, document_id: Uuid) -> bool {
        self.inner.managers.borrow().contains_key(&document_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.managers.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.managers.borrow().is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &QuantificationConfig {
        &self.inner.config
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new(QuantificationConfig::default())
    }
}

impl fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("managers", &self.len())
            .finish()
    }
}
