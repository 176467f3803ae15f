#![forbid(unsafe_code)]

//! Show and hide one edge on a display.
//!
//! A shown edge owns nothing itself. Everything it puts on screen belongs to
//! the host document:
//!
//! ```text
//!   display item ─┬─ signal graphic ◀──IntervalBinding──▶ edge.signal_eels_interval
//!                 ├─ fit graphics   ◀──IntervalListBinding──▶ edge.fit_eels_intervals
//!                 ├─ layer "Signal"      (channel: signal data item)
//!                 └─ layer "Background"  (channel: background data item)
//!
//!   computation(processing_id, source = display item)
//!     eels_edge_uuid, eels_spectrum_data_item, fit_interval_graphics,
//!     signal_interval_graphic  ──▶  subtracted, background
//! ```
//!
//! An [`EelsEdgeDisplay`] is built either fresh ([`EelsEdgeDisplay::new`],
//! [`EelsEdgeDisplay::with_signal_graphic`]) or attached to artifacts found in
//! the document ([`EelsEdgeDisplay::attach`]). `show` then creates only what
//! is missing, so calling it again reconciles instead of duplicating.
//!
//! When the host deletes the signal graphic or the computation, the display
//! clears the reference and asks its owner to hide it through the
//! `should_hide` callback.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use eels_core::{EdgeProperty, EelsEdge, EelsError, IntervalConverter, Subscription};
use eels_host::{
    Computation, DataItem, DisplayItem, DisplayLayer, DocumentModel, HostObjectRef,
    IntervalGraphic,
};

use crate::config::QuantificationConfig;
use crate::error::Result;
use crate::interval_binding::IntervalBinding;
use crate::interval_list_binding::{FIT_INTERVAL_GRAPHICS, IntervalListBinding, SharedGraphics};

/// Computation variable holding the edge UUID as a string.
pub const EELS_EDGE_UUID: &str = "eels_edge_uuid";
/// Computation input holding the source spectrum.
pub const EELS_SPECTRUM_DATA_ITEM: &str = "eels_spectrum_data_item";
/// Computation input holding the signal graphic.
pub const SIGNAL_INTERVAL_GRAPHIC: &str = "signal_interval_graphic";
/// Computation result receiving the background-subtracted signal.
pub const SUBTRACTED: &str = "subtracted";
/// Computation result receiving the fitted background.
pub const BACKGROUND: &str = "background";
/// Display property switched on while edges are shown.
pub const LEGEND_POSITION: &str = "legend_position";

/// Asks the owner of an edge display to hide it.
pub type ShouldHide = Rc<dyn Fn(&EelsEdgeDisplay)>;

/// Host artifacts of an edge that is already shown, recovered from its
/// computation.
#[derive(Clone, Default)]
pub struct EdgeDisplayResources {
    pub signal_data_item: Option<Rc<dyn DataItem>>,
    pub background_data_item: Option<Rc<dyn DataItem>>,
    pub signal_interval_graphic: Option<Rc<dyn IntervalGraphic>>,
    pub fit_interval_graphics: Vec<Rc<dyn IntervalGraphic>>,
    pub computation: Option<Rc<dyn Computation>>,
}

impl EdgeDisplayResources {
    /// Read the bound inputs and results of an existing computation.
    #[must_use]
    pub fn from_computation(computation: &Rc<dyn Computation>) -> Self {
        Self {
            signal_data_item: computation.result(SUBTRACTED),
            background_data_item: computation.result(BACKGROUND),
            signal_interval_graphic: computation
                .bound_object(SIGNAL_INTERVAL_GRAPHIC)
                .and_then(|object| object.as_graphic().cloned()),
            fit_interval_graphics: computation
                .objects(FIT_INTERVAL_GRAPHICS)
                .iter()
                .filter_map(|object| object.as_graphic().cloned())
                .collect(),
            computation: Some(Rc::clone(computation)),
        }
    }
}

impl fmt::Debug for EdgeDisplayResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeDisplayResources")
            .field("signal_data_item", &self.signal_data_item.as_ref().map(|i| i.id()))
            .field("background_data_item", &self.background_data_item.as_ref().map(|i| i.id()))
            .field(
                "signal_interval_graphic",
                &self.signal_interval_graphic.as_ref().map(|g| g.id()),
            )
            .field("fit_interval_graphics", &self.fit_interval_graphics.len())
            .field("computation", &self.computation.as_ref().map(|c| c.id()))
            .finish()
    }
}

#[derive(Default)]
struct Artifacts {
    signal_data_item: Option<Rc<dyn DataItem>>,
    background_data_item: Option<Rc<dyn DataItem>>,
    signal_interval_graphic: Option<Rc<dyn IntervalGraphic>>,
    computation: Option<Rc<dyn Computation>>,
}

#[derive(Default)]
struct Connections {
    signal_binding: Option<IntervalBinding>,
    list_binding: Option<IntervalListBinding>,
    signal_graphic_removed: Option<Subscription>,
    computation_removed: Option<Subscription>,
}

struct EdgeDisplayInner {
    edge: Rc<EelsEdge>,
    should_hide: ShouldHide,
    artifacts: RefCell<Artifacts>,
    fit_graphics: SharedGraphics,
    connections: RefCell<Connections>,
}

/// One edge's presence on one display. Cloning yields another handle to the
/// same display.
#[derive(Clone)]
pub struct EelsEdgeDisplay {
    inner: Rc<EdgeDisplayInner>,
}

impl EelsEdgeDisplay {
    /// A display that will create every artifact on first `show`.
    #[must_use]
    pub fn new(edge: Rc<EelsEdge>, should_hide: ShouldHide) -> Self {
        Self::attach(edge, EdgeDisplayResources::default(), should_hide)
    }

    /// A display that reuses a graphic the user already drew as its signal
    /// graphic.
    #[must_use]
    pub fn with_signal_graphic(
        edge: Rc<EelsEdge>,
        signal_interval_graphic: Rc<dyn IntervalGraphic>,
        should_hide: ShouldHide,
    ) -> Self {
        let resources = EdgeDisplayResources {
            signal_interval_graphic: Some(signal_interval_graphic),
            ..EdgeDisplayResources::default()
        };
        Self::attach(edge, resources, should_hide)
    }

    /// A display bound to artifacts that already exist in the document.
    #[must_use]
    pub fn attach(edge: Rc<EelsEdge>, resources: EdgeDisplayResources, should_hide: ShouldHide) -> Self {
        let EdgeDisplayResources {
            signal_data_item,
            background_data_item,
            signal_interval_graphic,
            fit_interval_graphics,
            computation,
        } = resources;
        Self {
            inner: Rc::new(EdgeDisplayInner {
                edge,
                should_hide,
                artifacts: RefCell::new(Artifacts {
                    signal_data_item,
                    background_data_item,
                    signal_interval_graphic,
                    computation,
                }),
                fit_graphics: Rc::new(RefCell::new(fit_interval_graphics)),
                connections: RefCell::new(Connections::default()),
            }),
        }
    }

    #[must_use]
    pub fn eels_edge(&self) -> &Rc<EelsEdge> {
        &self.inner.edge
    }

    /// Whether the bindings are live (between `show` and `hide`).
    #[must_use]
    pub fn is_shown(&self) -> bool {
        let connections = self.inner.connections.borrow();
        connections.signal_binding.is_some() && connections.list_binding.is_some()
    }

    #[must_use]
    pub fn signal_data_item(&self) -> Option<Rc<dyn DataItem>> {
        self.inner.artifacts.borrow().signal_data_item.clone()
    }

    #[must_use]
    pub fn background_data_item(&self) -> Option<Rc<dyn DataItem>> {
        self.inner.artifacts.borrow().background_data_item.clone()
    }

    #[must_use]
    pub fn signal_interval_graphic(&self) -> Option<Rc<dyn IntervalGraphic>> {
        self.inner.artifacts.borrow().signal_interval_graphic.clone()
    }

    #[must_use]
    pub fn fit_interval_graphics(&self) -> Vec<Rc<dyn IntervalGraphic>> {
        self.inner.fit_graphics.borrow().clone()
    }

    #[must_use]
    pub fn computation(&self) -> Option<Rc<dyn Computation>> {
        self.inner.artifacts.borrow().computation.clone()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Put the edge on `display_item`, creating whatever is missing.
    ///
    /// Conversions are checked before anything is created, so an error
    /// leaves the document untouched.
    pub fn show(
        &self,
        document: &dyn DocumentModel,
        display_item: &Rc<dyn DisplayItem>,
        data_item: &Rc<dyn DataItem>,
        config: &QuantificationConfig,
    ) -> Result<()> {
        let edge = Rc::clone(&self.inner.edge);
        let _span = tracing::debug_span!("show", edge = %edge.uuid()).entered();

        let converter = IntervalConverter::new(data_item.data_len(), data_item.calibration())?;
        let existing = {
            let artifacts = self.inner.artifacts.borrow();
            Artifacts {
                signal_data_item: artifacts.signal_data_item.clone(),
                background_data_item: artifacts.background_data_item.clone(),
                signal_interval_graphic: artifacts.signal_interval_graphic.clone(),
                computation: artifacts.computation.clone(),
            }
        };
        let signal_fraction = match &existing.signal_interval_graphic {
            Some(_) => None,
            None => {
                let interval = edge
                    .signal_eels_interval()
                    .ok_or(EelsError::MissingSignalInterval)?;
                Some(converter.convert(&interval)?)
            }
        };
        let fit_fractions = edge
            .fit_eels_intervals()
            .iter()
            .map(|interval| converter.convert(interval))
            .collect::<std::result::Result<Vec<_>, EelsError>>()?;

        self.release_connections();

        // Derived data items.
        let signal_data_item = existing
            .signal_data_item
            .unwrap_or_else(|| derived_data_item(document, data_item, &config.signal_label));
        let background_data_item = existing
            .background_data_item
            .unwrap_or_else(|| derived_data_item(document, data_item, &config.background_label));

        // Background first so the signal layer ends up on top.
        ensure_layer(
            display_item.as_ref(),
            &background_data_item,
            &config.background_label,
            &config.background_fill_color,
        );
        ensure_layer(
            display_item.as_ref(),
            &signal_data_item,
            &config.signal_label,
            &config.signal_fill_color,
        );

        // Signal graphic.
        let signal_graphic = match existing.signal_interval_graphic {
            Some(graphic) => graphic,
            None => {
                let graphic = display_item.add_interval_graphic();
                if let Some(fraction) = signal_fraction {
                    graphic.set_interval(fraction);
                }
                graphic
            }
        };
        let signal_graphic_removed = {
            let weak = Rc::downgrade(&self.inner);
            signal_graphic.on_about_to_be_removed(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                inner.artifacts.borrow_mut().signal_interval_graphic = None;
                tracing::debug!(edge = %inner.edge.uuid(), "signal graphic deleted by host");
                let display = EelsEdgeDisplay {
                    inner: Rc::clone(&inner),
                };
                (inner.should_hide)(&display);
            }))
        };
        let signal_binding = IntervalBinding::new(
            converter.clone(),
            &edge,
            EdgeProperty::SignalEelsInterval,
            Rc::clone(&signal_graphic),
        )?;

        // Fit graphics, one per fit interval.
        let surplus = {
            let current = self.inner.fit_graphics.borrow().clone();
            let mut graphics = Vec::with_capacity(fit_fractions.len());
            for (index, fraction) in fit_fractions.iter().enumerate() {
                let graphic = match current.get(index) {
                    Some(graphic) => Rc::clone(graphic),
                    None => display_item.add_interval_graphic(),
                };
                graphic.set_interval(*fraction);
                graphics.push(graphic);
            }
            *self.inner.fit_graphics.borrow_mut() = graphics;
            current
                .get(fit_fractions.len()..)
                .map(<[_]>::to_vec)
                .unwrap_or_default()
        };
        if !surplus.is_empty() {
            tracing::warn!(edge = %edge.uuid(), surplus = surplus.len(), "removing surplus fit graphics");
        }
        for graphic in surplus {
            display_item.remove_graphic(&*graphic);
        }
        let fit_objects: Vec<HostObjectRef> = self
            .inner
            .fit_graphics
            .borrow()
            .iter()
            .map(|graphic| HostObjectRef::Graphic(Rc::clone(graphic)))
            .collect();

        // Background-subtraction computation.
        let computation = match existing.computation {
            Some(computation) => computation,
            None => {
                let computation = document.create_computation(&config.processing_id, display_item);
                computation.create_variable(
                    EELS_EDGE_UUID,
                    serde_json::Value::String(edge.uuid().to_string()),
                );
                computation.create_object(
                    EELS_SPECTRUM_DATA_ITEM,
                    HostObjectRef::DataItem(Rc::clone(data_item)),
                );
                computation.create_result(SUBTRACTED, Rc::clone(&signal_data_item));
                computation.create_result(BACKGROUND, Rc::clone(&background_data_item));
                document.append_computation(&computation);
                tracing::debug!(computation = %computation.id(), "computation created");
                computation
            }
        };
        computation.create_objects(FIT_INTERVAL_GRAPHICS, fit_objects);
        computation.create_object(
            SIGNAL_INTERVAL_GRAPHIC,
            HostObjectRef::Graphic(Rc::clone(&signal_graphic)),
        );

        let list_binding = IntervalListBinding::new(
            Rc::clone(display_item),
            Rc::clone(&computation),
            Rc::clone(&edge),
            Rc::clone(&self.inner.fit_graphics),
            converter,
        );

        let computation_removed = {
            let weak = Rc::downgrade(&self.inner);
            computation.on_about_to_be_removed(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                {
                    // The host removes both results with the computation.
                    let mut artifacts = inner.artifacts.borrow_mut();
                    artifacts.computation = None;
                    artifacts.signal_data_item = None;
                    artifacts.background_data_item = None;
                }
                tracing::debug!(edge = %inner.edge.uuid(), "computation deleted by host");
                let display = EelsEdgeDisplay {
                    inner: Rc::clone(&inner),
                };
                (inner.should_hide)(&display);
            }))
        };

        display_item.set_display_property(LEGEND_POSITION, &config.legend_position);

        *self.inner.artifacts.borrow_mut() = Artifacts {
            signal_data_item: Some(signal_data_item),
            background_data_item: Some(background_data_item),
            signal_interval_graphic: Some(signal_graphic),
            computation: Some(computation),
        };
        *self.inner.connections.borrow_mut() = Connections {
            signal_binding: Some(signal_binding),
            list_binding: Some(list_binding),
            signal_graphic_removed: Some(signal_graphic_removed),
            computation_removed: Some(computation_removed),
        };
        tracing::debug!(edge = %edge.uuid(), "edge shown");
        Ok(())
    }

    /// Remove everything `show` put in the document. Anything already gone
    /// is skipped, so calling this twice is harmless.
    pub fn hide(&self, document: &dyn DocumentModel, display_item: &dyn DisplayItem) {
        let _span = tracing::debug_span!("hide", edge = %self.inner.edge.uuid()).entered();
        self.release_connections();

        let artifacts = std::mem::take(&mut *self.inner.artifacts.borrow_mut());
        let fit_graphics = std::mem::take(&mut *self.inner.fit_graphics.borrow_mut());

        if let Some(computation) = artifacts.computation {
            document.remove_computation(&*computation);
        }
        if let Some(graphic) = artifacts.signal_interval_graphic {
            display_item.remove_graphic(&*graphic);
        }
        for graphic in fit_graphics {
            display_item.remove_graphic(&*graphic);
        }
        // Normally already removed together with the computation.
        let derived = [artifacts.background_data_item, artifacts.signal_data_item];
        for data_item in derived.into_iter().flatten() {
            if document.contains_data_item(data_item.id()) {
                document.remove_data_item(&*data_item);
            }
        }
        tracing::debug!(edge = %self.inner.edge.uuid(), "edge hidden");
    }

    /// Drop bindings and host subscriptions, leaving the artifacts in place.
    pub fn close(&self) {
        self.release_connections();
    }

    fn release_connections(&self) {
        let connections = std::mem::take(&mut *self.inner.connections.borrow_mut());
        drop(connections);
    }
}

impl PartialEq for EelsEdgeDisplay {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EelsEdgeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EelsEdgeDisplay")
            .field("edge", &self.inner.edge.uuid())
            .field("shown", &self.is_shown())
            .field("fit_graphics", &self.inner.fit_graphics.borrow().len())
            .finish()
    }
}

fn derived_data_item(
    document: &dyn DocumentModel,
    source: &Rc<dyn DataItem>,
    label: &str,
) -> Rc<dyn DataItem> {
    let data_item = document.create_data_item();
    document.append_data_item(&data_item, false);
    data_item.set_title(&format!("{} {label}", source.title()));
    data_item
}

fn ensure_layer(display_item: &dyn DisplayItem, data_item: &Rc<dyn DataItem>, label: &str, fill_color: &str) {
    if display_item
        .display_data_channel_index(data_item.as_ref())
        .is_some()
    {
        return;
    }
    let data_index = display_item.append_display_data_channel(Rc::clone(data_item));
    display_item.insert_display_layer(
        0,
        DisplayLayer {
            data_index,
            label: Some(label.to_owned()),
            fill_color: Some(fill_color.to_owned()),
        },
    );
}
