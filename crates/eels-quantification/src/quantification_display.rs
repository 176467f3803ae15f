#![forbid(unsafe_code)]

//! Which edges of a quantification are shown on which display.
//!
//! An [`EelsQuantificationDisplay`] is backed by a record of type
//! `nion.eels_quantification_display`, sourced on its quantification's
//! record:
//!
//! ```text
//!   eels_edge_displays: [{ eels_edge_uuid }, ...]
//!   eels_display_item:  -> display item
//!   eels_data_item:     -> source spectrum
//! ```
//!
//! On load, each persisted entry is matched to the background-subtraction
//! computation that carries its edge UUID, and the edge display is
//! re-attached to that computation's graphics and results instead of
//! creating new ones. Entries whose edge or computation is gone are dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{EelsEdge, EelsError, EelsInterval, SubscriptionScope};
use eels_host::{
    Computation, DataItem, DataStructure, DisplayItem, DocumentModel, IntervalGraphic,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QuantificationConfig;
use crate::edge_display::{EELS_EDGE_UUID, EdgeDisplayResources, EelsEdgeDisplay, ShouldHide};
use crate::error::{QuantificationError, Result};
use crate::quantification::EelsQuantification;

/// Record property holding the shown edges.
pub const EELS_EDGE_DISPLAYS: &str = "eels_edge_displays";
/// Record reference to the display item.
pub const EELS_DISPLAY_ITEM: &str = "eels_display_item";
/// Record reference to the source spectrum.
pub const EELS_DATA_ITEM: &str = "eels_data_item";

/// One persisted entry of `eels_edge_displays`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDisplayRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eels_edge_uuid: Option<Uuid>,
}

/// Asks the owner of a quantification display to destroy it.
pub type ShouldRemove = Rc<dyn Fn(&Rc<EelsQuantificationDisplay>)>;

/// The shown edges of one quantification on one display item.
pub struct EelsQuantificationDisplay {
    this: Weak<Self>,
    quantification: Rc<EelsQuantification>,
    config: Rc<QuantificationConfig>,
    record_id: Uuid,
    record: RefCell<Option<Rc<dyn DataStructure>>>,
    display_item: Rc<dyn DisplayItem>,
    data_item: Rc<dyn DataItem>,
    edge_displays: RefCell<Vec<EelsEdgeDisplay>>,
    subscriptions: RefCell<SubscriptionScope>,
}

impl EelsQuantificationDisplay {
    /// Load the display stored in `record` and re-bind every edge it shows.
    ///
    /// `should_remove` is called when the display item or the data item is
    /// about to leave the document.
    pub fn new(
        quantification: Rc<EelsQuantification>,
        record: Rc<dyn DataStructure>,
        config: Rc<QuantificationConfig>,
        should_remove: Option<ShouldRemove>,
    ) -> Result<Rc<Self>> {
        let display_item = record
            .referenced_object(EELS_DISPLAY_ITEM)
            .and_then(|object| object.as_display_item().cloned())
            .ok_or(QuantificationError::MissingReference(EELS_DISPLAY_ITEM))?;
        let data_item = record
            .referenced_object(EELS_DATA_ITEM)
            .and_then(|object| object.as_data_item().cloned())
            .ok_or(QuantificationError::MissingReference(EELS_DATA_ITEM))?;
        let entries: Vec<EdgeDisplayRecord> = match record.property(EELS_EDGE_DISPLAYS) {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        let record_id = record.id();

        let display = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            quantification,
            config,
            record_id,
            record: RefCell::new(Some(record)),
            display_item,
            data_item,
            edge_displays: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(SubscriptionScope::new()),
        });
        display.subscribe(should_remove);
        display.reconstruct(&entries);
        Ok(display)
    }

    fn subscribe(&self, should_remove: Option<ShouldRemove>) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        {
            let weak = self.this.clone();
            subscriptions.hold(self.quantification.on_edge_removed(move |change| {
                let Some(this) = weak.upgrade() else {
                    return;
                };
                if let Some(display) = this.get_eels_edge_display_for_eels_edge(&change.item) {
                    tracing::debug!(edge = %change.item.uuid(), "edge removed, hiding");
                    this.should_hide(&display);
                }
            }));
        }
        let Some(should_remove) = should_remove else {
            return;
        };
        let callback = |source: &'static str| -> Box<dyn Fn()> {
            let weak = self.this.clone();
            let should_remove = Rc::clone(&should_remove);
            Box::new(move || {
                if let Some(this) = weak.upgrade() {
                    tracing::debug!(record = %this.record_id, source, "display source removed");
                    should_remove(&this);
                }
            })
        };
        subscriptions.hold(self.data_item.on_about_to_be_removed(callback(EELS_DATA_ITEM)));
        subscriptions.hold(
            self.display_item
                .on_about_to_be_removed(callback(EELS_DISPLAY_ITEM)),
        );
    }

    fn reconstruct(&self, entries: &[EdgeDisplayRecord]) {
        let display_item_id = self.display_item.id();
        let mut computations: HashMap<Uuid, Rc<dyn Computation>> = HashMap::new();
        for computation in self.document().computations() {
            if computation.processing_id() != self.config.processing_id
                || computation.source_id() != Some(display_item_id)
            {
                continue;
            }
            let edge_uuid = computation
                .variable(EELS_EDGE_UUID)
                .and_then(|value| value.as_str().and_then(|s| Uuid::parse_str(s).ok()));
            if let Some(edge_uuid) = edge_uuid {
                computations.insert(edge_uuid, computation);
            }
        }

        let mut attached = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(edge_uuid) = entry.eels_edge_uuid else {
                tracing::warn!(record = %self.record_id, "edge display entry without an edge");
                continue;
            };
            let Some(edge) = self.quantification.get_eels_edge_from_uuid(edge_uuid) else {
                tracing::warn!(record = %self.record_id, edge = %edge_uuid, "edge display refers to a missing edge");
                continue;
            };
            let Some(computation) = computations.get(&edge_uuid) else {
                tracing::debug!(edge = %edge_uuid, "no computation left for edge display, dropping");
                continue;
            };
            let resources = EdgeDisplayResources::from_computation(computation);
            attached.push(EelsEdgeDisplay::attach(edge, resources, self.should_hide_callback()));
        }

        let mut shown = Vec::with_capacity(attached.len());
        for edge_display in attached {
            match self.show_edge_display(&edge_display) {
                Ok(()) => shown.push(edge_display),
                Err(err) => {
                    let edge_uuid = edge_display.eels_edge().uuid();
                    tracing::error!(edge = %edge_uuid, %err, "reloaded edge cannot be shown, dropping");
                    edge_display.close();
                }
            }
        }
        let dropped = entries.len() - shown.len();
        *self.edge_displays.borrow_mut() = shown;
        if dropped > 0 {
            self.write_through();
        }
        tracing::debug!(record = %self.record_id, shown = self.edge_displays.borrow().len(), dropped, "quantification display loaded");
    }

    fn should_hide_callback(&self) -> ShouldHide {
        let weak = self.this.clone();
        Rc::new(move |display: &EelsEdgeDisplay| {
            if let Some(this) = weak.upgrade() {
                this.should_hide(display);
            }
        })
    }

    fn show_edge_display(&self, display: &EelsEdgeDisplay) -> Result<()> {
        display.show(
            self.document().as_ref(),
            &self.display_item,
            &self.data_item,
            &self.config,
        )
    }

    fn should_hide(&self, display: &EelsEdgeDisplay) {
        let removed = {
            let mut displays = self.edge_displays.borrow_mut();
            displays
                .iter()
                .position(|shown| shown.ptr_eq(display))
                .map(|index| displays.remove(index))
        };
        let Some(display) = removed else {
            return;
        };
        display.hide(self.document().as_ref(), self.display_item.as_ref());
        self.write_through();
    }

    fn should_show(&self, display: EelsEdgeDisplay) -> Result<()> {
        self.show_edge_display(&display)?;
        self.edge_displays.borrow_mut().push(display);
        self.write()
    }

    fn write(&self) -> Result<()> {
        let Some(record) = self.data_structure() else {
            return Ok(());
        };
        let entries: Vec<EdgeDisplayRecord> = self
            .edge_displays
            .borrow()
            .iter()
            .map(|display| EdgeDisplayRecord {
                eels_edge_uuid: Some(display.eels_edge().uuid()),
            })
            .collect();
        record.set_property(EELS_EDGE_DISPLAYS, serde_json::to_value(entries)?);
        Ok(())
    }

    fn write_through(&self) {
        if let Err(err) = self.write() {
            tracing::error!(record = %self.record_id, %err, "edge displays not persisted");
        }
    }

    fn document(&self) -> &Rc<dyn DocumentModel> {
        self.quantification.document()
    }

    #[must_use]
    pub fn quantification(&self) -> &Rc<EelsQuantification> {
        &self.quantification
    }

    #[must_use]
    pub fn data_structure(&self) -> Option<Rc<dyn DataStructure>> {
        self.record.borrow().clone()
    }

    #[must_use]
    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    #[must_use]
    pub fn eels_display_item(&self) -> &Rc<dyn DisplayItem> {
        &self.display_item
    }

    #[must_use]
    pub fn eels_data_item(&self) -> &Rc<dyn DataItem> {
        &self.data_item
    }

    /// Edge displays in the order they were shown.
    #[must_use]
    pub fn eels_edge_displays(&self) -> Vec<EelsEdgeDisplay> {
        self.edge_displays.borrow().clone()
    }

    #[must_use]
    pub fn get_eels_edge_display_for_eels_edge(&self, edge: &EelsEdge) -> Option<EelsEdgeDisplay> {
        self.edge_displays
            .borrow()
            .iter()
            .find(|display| display.eels_edge().uuid() == edge.uuid())
            .cloned()
    }

    #[must_use]
    pub fn is_eels_edge_visible(&self, edge: &EelsEdge) -> bool {
        self.get_eels_edge_display_for_eels_edge(edge).is_some()
    }

    /// Append `edge` to the quantification without showing it.
    pub fn add_eels_edge(&self, edge: Rc<EelsEdge>) -> Result<()> {
        self.quantification.append_edge(edge)
    }

    /// Remove `edge` from the quantification, hiding it first if shown.
    pub fn remove_eels_edge(&self, edge: &EelsEdge) -> Result<Rc<EelsEdge>> {
        let index = self
            .quantification
            .index_of(edge)
            .ok_or(EelsError::UnknownEdge(edge.uuid()))?;
        self.quantification.remove_edge(index)
    }

    /// Create an edge around a graphic the user drew and show it, keeping
    /// the graphic as its signal graphic.
    ///
    /// Fit windows are placed ahead of and behind the signal, scaled from
    /// its fractional bounds by the configured factors.
    pub fn add_eels_edge_from_interval_graphic(
        &self,
        graphic: Rc<dyn IntervalGraphic>,
    ) -> Result<Rc<EelsEdge>> {
        let data_len = self.data_item.data_len();
        let calibration = self.data_item.calibration();
        let (start, end) = graphic.interval();
        let [ahead_0, ahead_1] = self.config.fit_ahead;
        let [behind_0, behind_1] = self.config.fit_behind;

        let signal = EelsInterval::from_fractional_interval(data_len, &calibration, (start, end))?;
        let fit_ahead = EelsInterval::from_fractional_interval(
            data_len,
            &calibration,
            (start * ahead_0, start * ahead_1),
        )?;
        let fit_behind = EelsInterval::from_fractional_interval(
            data_len,
            &calibration,
            (end * behind_0, end * behind_1),
        )?;

        let edge = Rc::new(EelsEdge::new(Some(signal), vec![fit_ahead, fit_behind]));
        self.quantification.append_edge(Rc::clone(&edge))?;
        let display =
            EelsEdgeDisplay::with_signal_graphic(Rc::clone(&edge), graphic, self.should_hide_callback());
        self.should_show(display)?;
        Ok(edge)
    }

    /// Show `edge`. Already visible edges are left as they are.
    pub fn show_eels_edge(&self, edge: &Rc<EelsEdge>) -> Result<()> {
        if self.is_eels_edge_visible(edge) {
            return Ok(());
        }
        if self.quantification.index_of(edge).is_none() {
            return Err(EelsError::UnknownEdge(edge.uuid()).into());
        }
        let display = EelsEdgeDisplay::new(Rc::clone(edge), self.should_hide_callback());
        self.should_show(display)
    }

    /// Hide `edge`. Hidden edges are left as they are.
    pub fn hide_eels_edge(&self, edge: &EelsEdge) {
        if let Some(display) = self.get_eels_edge_display_for_eels_edge(edge) {
            self.should_hide(&display);
        }
    }

    /// Hide every edge, then remove the record.
    pub fn destroy(&self) {
        let displays = std::mem::take(&mut *self.edge_displays.borrow_mut());
        for display in displays.iter().rev() {
            display.hide(self.document().as_ref(), self.display_item.as_ref());
        }
        let record = self.record.borrow_mut().take();
        if let Some(record) = record {
            tracing::debug!(record = %self.record_id, "quantification display destroyed");
            self.document().remove_data_structure(&*record);
        }
    }

    /// Stop listening to the host and the quantification. Artifacts stay.
    pub fn close(&self) {
        self.subscriptions.borrow_mut().clear();
        for display in self.edge_displays.borrow().iter() {
            display.close();
        }
    }

    /// The record was removed by someone else; stop writing to it.
    pub fn data_structure_deleted(&self) {
        self.record.borrow_mut().take();
    }
}

impl fmt::Debug for EelsQuantificationDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EelsQuantificationDisplay")
            .field("record", &self.record_id)
            .field("quantification", &self.quantification.record_id())
            .field("display_item", &self.display_item.id())
            .field("shown", &self.edge_displays.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use eels_core::Calibration;
    use eels_host::HostObjectRef;
    use eels_host::memory::{MemoryDataItem, MemoryDisplayItem, MemoryDocument};
    use serde_json::json;

    use super::*;

    struct Fixture {
        document: Rc<MemoryDocument>,
        spectrum: Rc<MemoryDataItem>,
        display_item: Rc<MemoryDisplayItem>,
        quantification: Rc<EelsQuantification>,
        record: Rc<dyn DataStructure>,
    }

    fn fixture() -> Fixture {
        let document = MemoryDocument::new();
        let spectrum = document.add_data_item(1000, Calibration::identity(), "Spectrum");
        let display_item = document.add_display_item(&spectrum);
        let host: Rc<dyn DocumentModel> = Rc::clone(&document) as Rc<dyn DocumentModel>;

        let quantification_record = host.create_data_structure("nion.eels_quantification", None);
        host.append_data_structure(&quantification_record);
        let quantification =
            EelsQuantification::new(Rc::clone(&host), Rc::clone(&quantification_record)).unwrap();

        let record = host.create_data_structure(
            "nion.eels_quantification_display",
            Some(&quantification_record),
        );
        record.set_referenced_object(
            EELS_DISPLAY_ITEM,
            Some(HostObjectRef::DisplayItem(
                Rc::clone(&display_item) as Rc<dyn DisplayItem>
            )),
        );
        record.set_referenced_object(
            EELS_DATA_ITEM,
            Some(HostObjectRef::DataItem(Rc::clone(&spectrum) as Rc<dyn DataItem>)),
        );
        host.append_data_structure(&record);
        Fixture {
            document,
            spectrum,
            display_item,
            quantification,
            record,
        }
    }

    fn display(fx: &Fixture, should_remove: Option<ShouldRemove>) -> Rc<EelsQuantificationDisplay> {
        EelsQuantificationDisplay::new(
            Rc::clone(&fx.quantification),
            Rc::clone(&fx.record),
            Rc::new(QuantificationConfig::default()),
            should_remove,
        )
        .unwrap()
    }

    fn edge() -> Rc<EelsEdge> {
        Rc::new(EelsEdge::new(
            Some(EelsInterval::from_bounds(400.0, 420.0)),
            vec![EelsInterval::from_bounds(300.0, 350.0)],
        ))
    }

    #[test]
    fn show_and_hide_are_persisted() {
        let fx = fixture();
        let qd = display(&fx, None);
        let edge = edge();
        qd.add_eels_edge(Rc::clone(&edge)).unwrap();

        qd.show_eels_edge(&edge).unwrap();
        qd.show_eels_edge(&edge).unwrap();
        assert!(qd.is_eels_edge_visible(&edge));
        assert_eq!(qd.eels_edge_displays().len(), 1);
        assert_eq!(fx.document.computation_count(), 1);
        assert_eq!(
            fx.record.property(EELS_EDGE_DISPLAYS),
            Some(json!([{ "eels_edge_uuid": edge.uuid() }]))
        );

        qd.hide_eels_edge(&edge);
        qd.hide_eels_edge(&edge);
        assert!(!qd.is_eels_edge_visible(&edge));
        assert_eq!(fx.document.computation_count(), 0);
        assert_eq!(fx.display_item.graphic_count(), 0);
        assert_eq!(fx.record.property(EELS_EDGE_DISPLAYS), Some(json!([])));
    }

    #[test]
    fn showing_a_foreign_edge_fails() {
        let fx = fixture();
        let qd = display(&fx, None);
        let err = qd.show_eels_edge(&edge()).unwrap_err();
        assert!(matches!(
            err,
            QuantificationError::Model(EelsError::UnknownEdge(_))
        ));
        assert_eq!(fx.document.computation_count(), 0);
    }

    #[test]
    fn drawn_graphic_becomes_an_edge_with_fit_windows() {
        let fx = fixture();
        let qd = display(&fx, None);
        let drawn = qd.eels_display_item().add_interval_graphic();
        drawn.set_interval((0.25, 0.5));

        let edge = qd
            .add_eels_edge_from_interval_graphic(Rc::clone(&drawn))
            .unwrap();

        assert_eq!(fx.quantification.len(), 1);
        assert!(qd.is_eels_edge_visible(&edge));
        let signal = edge.signal_eels_interval().unwrap();
        assert!((signal.start_ev.unwrap() - 250.0).abs() < 1e-9);
        assert!((signal.end_ev.unwrap() - 500.0).abs() < 1e-9);
        let fits = edge.fit_eels_intervals();
        assert_eq!(fits.len(), 2);
        assert!((fits[0].start_ev.unwrap() - 200.0).abs() < 1e-9);
        assert!((fits[0].end_ev.unwrap() - 225.0).abs() < 1e-9);
        assert!((fits[1].start_ev.unwrap() - 550.0).abs() < 1e-9);
        assert!((fits[1].end_ev.unwrap() - 600.0).abs() < 1e-9);
        // The drawn graphic plus two fit graphics.
        assert_eq!(fx.display_item.graphic_count(), 3);
        let shown = qd.get_eels_edge_display_for_eels_edge(&edge).unwrap();
        assert_eq!(shown.signal_interval_graphic().map(|g| g.id()), Some(drawn.id()));
    }

    #[test]
    fn removing_an_edge_hides_it() {
        let fx = fixture();
        let qd = display(&fx, None);
        let edge = edge();
        qd.add_eels_edge(Rc::clone(&edge)).unwrap();
        qd.show_eels_edge(&edge).unwrap();

        let removed = qd.remove_eels_edge(&edge).unwrap();

        assert_eq!(removed.uuid(), edge.uuid());
        assert!(!qd.is_eels_edge_visible(&edge));
        assert_eq!(fx.document.computation_count(), 0);
        assert_eq!(fx.document.data_item_count(), 1);
        assert!(qd.remove_eels_edge(&edge).is_err());
    }

    #[test]
    fn deleting_the_spectrum_requests_removal() {
        let fx = fixture();
        let removals = Rc::new(Cell::new(0));
        let counter = Rc::clone(&removals);
        let should_remove: ShouldRemove =
            Rc::new(move |_: &Rc<EelsQuantificationDisplay>| counter.set(counter.get() + 1));
        let _qd = display(&fx, Some(should_remove));

        fx.document.remove_data_item(&*fx.spectrum);
        assert_eq!(removals.get(), 1);
    }

    #[test]
    fn missing_references_are_rejected() {
        let fx = fixture();
        fx.record.set_referenced_object(EELS_DATA_ITEM, None);
        let err = EelsQuantificationDisplay::new(
            Rc::clone(&fx.quantification),
            Rc::clone(&fx.record),
            Rc::new(QuantificationConfig::default()),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QuantificationError::MissingReference(EELS_DATA_ITEM)
        ));
    }

    #[test]
    fn destroy_hides_everything_and_removes_the_record() {
        let fx = fixture();
        let qd = display(&fx, None);
        let edge = edge();
        qd.add_eels_edge(Rc::clone(&edge)).unwrap();
        qd.show_eels_edge(&edge).unwrap();
        let records = fx.document.data_structure_count();

        qd.destroy();
        qd.destroy();

        assert!(qd.data_structure().is_none());
        assert_eq!(fx.document.data_structure_count(), records - 1);
        assert_eq!(fx.document.computation_count(), 0);
        assert_eq!(fx.display_item.graphic_count(), 0);
        assert_eq!(fx.quantification.len(), 1);
    }
}
