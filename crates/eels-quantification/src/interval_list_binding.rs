#![forbid(unsafe_code)]

//! Index-parallel binding between an edge's fit intervals and a list of
//! interval graphics.
//!
//! Three lists are kept in step: the edge's `fit_eels_intervals`, the shared
//! graphic list, and the computation's `fit_interval_graphics` input.
//!
//! | Origin | Event | Effect |
//! |--------|-------|--------|
//! | edge | insert at `i` | new graphic at `i`, listeners, computation input at `i` |
//! | edge | remove at `i` | listeners dropped, graphic `i` removed from the display |
//! | edge | value at `i` | graphic `i` moved (under `syncing`) |
//! | graphic | interval changed | `set_fit_eels_interval` (under `syncing`) |
//! | graphic | about to be removed | edge interval removed (under `removing_from_graphic`) |
//!
//! Graphic listeners find their index by graphic identity when they fire, so
//! insertions and removals before them never misroute an event.
//!
//! When an edge change and a graphic change race, the edge wins: a value
//! pushed from the edge is written while `syncing` is held, so the graphic's
//! own notification never writes back.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{
    EchoGuard, EelsEdge, EelsInterval, FIT_EELS_INTERVALS, IntervalConverter, ListChange,
    Subscription, SubscriptionScope,
};
use eels_host::{
    Computation, DisplayItem, HostObjectRef, INTERVAL_PROPERTY, IntervalGraphic,
};
use uuid::Uuid;

/// Computation input holding the ordered fit graphics.
pub const FIT_INTERVAL_GRAPHICS: &str = "fit_interval_graphics";

/// Graphic list shared between a binding and the display that owns it.
pub type SharedGraphics = Rc<RefCell<Vec<Rc<dyn IntervalGraphic>>>>;

struct GraphicListeners {
    graphic_id: Uuid,
    _changed: Subscription,
    _removed: Subscription,
}

struct ListState {
    edge: Rc<EelsEdge>,
    display_item: Rc<dyn DisplayItem>,
    computation: Rc<dyn Computation>,
    converter: IntervalConverter,
    graphics: SharedGraphics,
    listeners: RefCell<Vec<GraphicListeners>>,
    syncing: EchoGuard,
    removing_from_graphic: EchoGuard,
}

impl ListState {
    fn index_of(&self, graphic_id: Uuid) -> Option<usize> {
        self.graphics
            .borrow()
            .iter()
            .position(|graphic| graphic.id() == graphic_id)
    }

    fn listen(state: &Rc<Self>, graphic: &Rc<dyn IntervalGraphic>) -> GraphicListeners {
        let graphic_id = graphic.id();
        let weak = Rc::downgrade(state);
        let changed = graphic.on_property_changed(Box::new(move |name: &str| {
            if name != INTERVAL_PROPERTY {
                return;
            }
            if let Some(state) = weak.upgrade() {
                state.graphic_moved(graphic_id);
            }
        }));
        let weak = Rc::downgrade(state);
        let removed = graphic.on_about_to_be_removed(Box::new(move || {
            if let Some(state) = weak.upgrade() {
                state.graphic_removed(graphic_id);
            }
        }));
        GraphicListeners {
            graphic_id,
            _changed: changed,
            _removed: removed,
        }
    }

    fn drop_listeners(&self, graphic_id: Uuid) {
        let released = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|entry| entry.graphic_id == graphic_id)
                .map(|position| listeners.remove(position))
        };
        drop(released);
    }

    fn push_value(&self, graphic: &dyn IntervalGraphic, interval: &EelsInterval) {
        match self.converter.convert(interval) {
            Ok(fractional) => graphic.set_interval(fractional),
            Err(err) => {
                tracing::error!(edge = %self.edge.uuid(), %err, "fit interval cannot be shown");
            }
        }
    }

    // Edge-originated events.

    fn interval_inserted(state: &Rc<Self>, change: &ListChange<EelsInterval>) {
        let graphic = state.display_item.add_interval_graphic();
        let index = {
            let mut graphics = state.graphics.borrow_mut();
            let index = change.index.min(graphics.len());
            graphics.insert(index, Rc::clone(&graphic));
            index
        };
        if let Some(_token) = state.syncing.try_acquire() {
            state.push_value(graphic.as_ref(), &change.item);
        }
        let listeners = Self::listen(state, &graphic);
        {
            let mut all = state.listeners.borrow_mut();
            let position = index.min(all.len());
            all.insert(position, listeners);
        }
        state.computation.insert_item_into_objects(
            FIT_INTERVAL_GRAPHICS,
            index,
            HostObjectRef::Graphic(graphic),
        );
        tracing::trace!(edge = %state.edge.uuid(), index, "fit graphic inserted");
    }

    fn interval_removed(&self, change: &ListChange<EelsInterval>) {
        if self.removing_from_graphic.is_active() {
            return;
        }
        let graphic = {
            let mut graphics = self.graphics.borrow_mut();
            if change.index >= graphics.len() {
                None
            } else {
                Some(graphics.remove(change.index))
            }
        };
        let Some(graphic) = graphic else {
            tracing::error!(
                edge = %self.edge.uuid(),
                index = change.index,
                "fit interval removed without a matching graphic"
            );
            return;
        };
        self.drop_listeners(graphic.id());
        // The host also drops the graphic from the computation's inputs.
        self.display_item.remove_graphic(&*graphic);
        tracing::trace!(edge = %self.edge.uuid(), index = change.index, "fit graphic removed");
    }

    fn interval_value_changed(&self, change: &ListChange<EelsInterval>) {
        let Some(_token) = self.syncing.try_acquire() else {
            return;
        };
        let graphic = self.graphics.borrow().get(change.index).cloned();
        match graphic {
            Some(graphic) => self.push_value(graphic.as_ref(), &change.item),
            None => tracing::error!(
                edge = %self.edge.uuid(),
                index = change.index,
                "fit interval changed without a matching graphic"
            ),
        }
    }

    // Graphic-originated events.

    fn graphic_moved(&self, graphic_id: Uuid) {
        let Some(_token) = self.syncing.try_acquire() else {
            return;
        };
        let Some(index) = self.index_of(graphic_id) else {
            return;
        };
        let graphic = self.graphics.borrow().get(index).cloned();
        let Some(graphic) = graphic else {
            return;
        };
        let interval = self.converter.convert_back(graphic.interval());
        tracing::trace!(edge = %self.edge.uuid(), index, ?interval, "fit graphic moved");
        if let Err(err) = self.edge.set_fit_eels_interval(index, interval) {
            tracing::error!(edge = %self.edge.uuid(), %err, "fit graphic out of step with edge");
        }
    }

    fn graphic_removed(&self, graphic_id: Uuid) {
        let Some(index) = self.index_of(graphic_id) else {
            return;
        };
        {
            let _token = self.removing_from_graphic.try_acquire();
            if let Err(err) = self.edge.remove_fit_eels_interval(index) {
                tracing::error!(edge = %self.edge.uuid(), %err, "fit graphic out of step with edge");
            }
        }
        self.drop_listeners(graphic_id);
        let removed = {
            let mut graphics = self.graphics.borrow_mut();
            graphics
                .iter()
                .position(|graphic| graphic.id() == graphic_id)
                .map(|position| graphics.remove(position))
        };
        drop(removed);
        tracing::trace!(edge = %self.edge.uuid(), index, "fit graphic deleted by host");
    }
}

/// Keeps an edge's fit intervals, a graphic list and a computation input
/// index-for-index parallel.
pub struct IntervalListBinding {
    state: Option<Rc<ListState>>,
    edge_subscriptions: SubscriptionScope,
}

impl IntervalListBinding {
    /// Bind `edge`'s fit intervals to `graphics`, which must already hold one
    /// graphic per interval.
    pub fn new(
        display_item: Rc<dyn DisplayItem>,
        computation: Rc<dyn Computation>,
        edge: Rc<EelsEdge>,
        graphics: SharedGraphics,
        converter: IntervalConverter,
    ) -> Self {
        let state = Rc::new(ListState {
            edge: Rc::clone(&edge),
            display_item,
            computation,
            converter,
            graphics,
            listeners: RefCell::new(Vec::new()),
            syncing: EchoGuard::new(),
            removing_from_graphic: EchoGuard::new(),
        });

        let existing = state.graphics.borrow().clone();
        if existing.len() != edge.fit_eels_interval_count() {
            tracing::warn!(
                edge = %edge.uuid(),
                graphics = existing.len(),
                intervals = edge.fit_eels_interval_count(),
                "fit graphics out of step at bind time"
            );
        }
        let listeners = existing
            .iter()
            .map(|graphic| ListState::listen(&state, graphic))
            .collect();
        *state.listeners.borrow_mut() = listeners;

        let mut edge_subscriptions = SubscriptionScope::new();
        let weak: Weak<ListState> = Rc::downgrade(&state);
        edge_subscriptions.hold(edge.on_item_inserted(move |change| {
            if change.key != FIT_EELS_INTERVALS {
                return;
            }
            if let Some(state) = weak.upgrade() {
                ListState::interval_inserted(&state, change);
            }
        }));
        let weak = Rc::downgrade(&state);
        edge_subscriptions.hold(edge.on_item_removed(move |change| {
            if change.key != FIT_EELS_INTERVALS {
                return;
            }
            if let Some(state) = weak.upgrade() {
                state.interval_removed(change);
            }
        }));
        let weak = Rc::downgrade(&state);
        edge_subscriptions.hold(edge.on_item_value_changed(move |change| {
            if change.key != FIT_EELS_INTERVALS {
                return;
            }
            if let Some(state) = weak.upgrade() {
                state.interval_value_changed(change);
            }
        }));

        Self {
            state: Some(state),
            edge_subscriptions,
        }
    }

    /// Number of graphics with live listeners.
    #[must_use]
    pub fn bound_graphic_count(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.listeners.borrow().len())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Detach from the edge and from every graphic. Later calls are no-ops.
    pub fn close(&mut self) {
        self.edge_subscriptions.clear();
        if let Some(state) = self.state.take() {
            let listeners = std::mem::take(&mut *state.listeners.borrow_mut());
            drop(listeners);
        }
    }
}

impl Drop for IntervalListBinding {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for IntervalListBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalListBinding")
            .field("bound_graphics", &self.bound_graphic_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use eels_core::Calibration;
    use eels_host::DocumentModel;
    use eels_host::memory::{MemoryDisplayItem, MemoryDocument};

    use super::*;

    struct Fixture {
        document: Rc<MemoryDocument>,
        display_item: Rc<MemoryDisplayItem>,
        computation: Rc<dyn Computation>,
        edge: Rc<EelsEdge>,
        graphics: SharedGraphics,
        converter: IntervalConverter,
    }

    fn interval(start: f64) -> EelsInterval {
        EelsInterval::from_bounds(start, start + 16.0)
    }

    fn fixture(fits: &[f64]) -> Fixture {
        let document = MemoryDocument::new();
        let data_item = document.add_data_item(2048, Calibration::identity(), "EELS");
        let display_item = document.add_display_item(&data_item);
        let source: Rc<dyn DisplayItem> = Rc::clone(&display_item) as Rc<dyn DisplayItem>;
        let computation = document.create_computation("test.subtraction", &source);
        document.append_computation(&computation);
        let converter = IntervalConverter::new(2048, Calibration::identity()).unwrap();
        let edge = Rc::new(EelsEdge::new(
            None,
            fits.iter().copied().map(interval).collect(),
        ));
        let graphics: SharedGraphics = Rc::new(RefCell::new(Vec::new()));
        for fit in edge.fit_eels_intervals() {
            let graphic = source.add_interval_graphic();
            graphic.set_interval(converter.convert(&fit).unwrap());
            graphics.borrow_mut().push(graphic);
        }
        computation.create_objects(
            FIT_INTERVAL_GRAPHICS,
            graphics
                .borrow()
                .iter()
                .map(|graphic| HostObjectRef::Graphic(Rc::clone(graphic)))
                .collect(),
        );
        Fixture {
            document,
            display_item,
            computation,
            edge,
            graphics,
            converter,
        }
    }

    fn bind(fx: &Fixture) -> IntervalListBinding {
        IntervalListBinding::new(
            Rc::clone(&fx.display_item) as Rc<dyn DisplayItem>,
            Rc::clone(&fx.computation),
            Rc::clone(&fx.edge),
            Rc::clone(&fx.graphics),
            fx.converter.clone(),
        )
    }

    fn graphic_ids(fx: &Fixture) -> Vec<Uuid> {
        fx.graphics.borrow().iter().map(|graphic| graphic.id()).collect()
    }

    fn computation_ids(fx: &Fixture) -> Vec<Uuid> {
        fx.computation
            .objects(FIT_INTERVAL_GRAPHICS)
            .iter()
            .map(HostObjectRef::id)
            .collect()
    }

    fn assert_parallel(fx: &Fixture) {
        let intervals = fx.edge.fit_eels_intervals();
        let graphics = fx.graphics.borrow();
        assert_eq!(graphics.len(), intervals.len());
        for (graphic, interval) in graphics.iter().zip(&intervals) {
            let expected = fx.converter.convert(interval).unwrap();
            let actual = graphic.interval();
            assert!((actual.0 - expected.0).abs() < 1e-9);
            assert!((actual.1 - expected.1).abs() < 1e-9);
        }
    }

    #[test]
    fn edge_insert_creates_a_graphic_at_the_index() {
        let fx = fixture(&[100.0, 300.0]);
        let _binding = bind(&fx);

        fx.edge.insert_fit_eels_interval(1, interval(200.0)).unwrap();

        assert_parallel(&fx);
        assert_eq!(fx.display_item.graphic_count(), 3);
        assert_eq!(computation_ids(&fx), graphic_ids(&fx));
    }

    #[test]
    fn edge_remove_keeps_the_other_graphics() {
        let fx = fixture(&[100.0, 200.0, 300.0]);
        let _binding = bind(&fx);
        let before = graphic_ids(&fx);

        fx.edge.remove_fit_eels_interval(1).unwrap();

        assert_eq!(graphic_ids(&fx), vec![before[0], before[2]]);
        assert_eq!(fx.display_item.graphic_count(), 2);
        assert_eq!(computation_ids(&fx), graphic_ids(&fx));
        assert_parallel(&fx);
    }

    #[test]
    fn edge_value_change_moves_the_graphic_without_echo() {
        let fx = fixture(&[100.0]);
        let _binding = bind(&fx);
        let writes = fx.display_item.interval_graphics()[0].write_count();

        fx.edge.set_fit_eels_interval(0, interval(512.0)).unwrap();

        assert_eq!(fx.display_item.interval_graphics()[0].write_count(), writes + 1);
        assert_eq!(fx.edge.fit_eels_interval(0), Some(interval(512.0)));
        assert_parallel(&fx);
    }

    #[test]
    fn graphic_move_updates_the_edge() {
        let fx = fixture(&[100.0, 200.0]);
        let _binding = bind(&fx);
        let second = Rc::clone(&fx.graphics.borrow()[1]);

        second.set_interval((0.5, 0.75));

        assert_eq!(
            fx.edge.fit_eels_interval(1),
            Some(EelsInterval::from_bounds(1024.0, 1536.0))
        );
        assert_eq!(second.interval(), (0.5, 0.75));
    }

    #[test]
    fn graphic_listeners_follow_their_graphic_after_inserts() {
        let fx = fixture(&[100.0, 200.0]);
        let _binding = bind(&fx);
        let second = Rc::clone(&fx.graphics.borrow()[1]);

        fx.edge.insert_fit_eels_interval(0, interval(50.0)).unwrap();
        second.set_interval((0.5, 0.75));

        assert_eq!(
            fx.edge.fit_eels_interval(2),
            Some(EelsInterval::from_bounds(1024.0, 1536.0))
        );
        assert_eq!(fx.edge.fit_eels_interval(1), Some(interval(100.0)));
    }

    #[test]
    fn deleting_a_graphic_removes_the_interval_once() {
        let fx = fixture(&[100.0, 200.0, 300.0]);
        let _binding = bind(&fx);
        let removals = Rc::new(std::cell::Cell::new(0));
        let counter = Rc::clone(&removals);
        let _sub = fx.edge.on_item_removed(move |_| counter.set(counter.get() + 1));
        let middle = Rc::clone(&fx.graphics.borrow()[1]);

        fx.display_item.remove_graphic(&*middle);

        assert_eq!(removals.get(), 1);
        assert_eq!(
            fx.edge.fit_eels_intervals(),
            vec![interval(100.0), interval(300.0)]
        );
        assert_eq!(fx.display_item.graphic_count(), 2);
        assert_eq!(computation_ids(&fx), graphic_ids(&fx));
        assert_parallel(&fx);
    }

    #[test]
    fn binds_every_existing_graphic() {
        let fx = fixture(&[100.0, 200.0]);
        let binding = bind(&fx);
        assert_eq!(binding.bound_graphic_count(), 2);
        assert!(fx.document.contains_computation(fx.computation.id()));
    }

    #[test]
    fn closed_binding_stops_mirroring() {
        let fx = fixture(&[100.0]);
        let mut binding = bind(&fx);
        binding.close();
        binding.close();
        assert!(binding.is_closed());

        fx.edge.append_fit_eels_interval(interval(300.0));
        assert_eq!(fx.display_item.graphic_count(), 1);

        let only = Rc::clone(&fx.graphics.borrow()[0]);
        fx.display_item.remove_graphic(&*only);
        assert_eq!(fx.edge.fit_eels_interval_count(), 2);
    }
}
