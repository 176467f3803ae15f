#![forbid(unsafe_code)]

//! In-memory data items, interval graphics and display items.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use eels_core::{Calibration, Event, FractionalInterval, Subscription};
use uuid::Uuid;

use super::MemoryDocument;
use crate::items::{DataItem, DisplayItem, DisplayLayer, INTERVAL_PROPERTY, IntervalGraphic};
use crate::object::HostObject;

// ---------------------------------------------------------------------------
// MemoryDataItem
// ---------------------------------------------------------------------------

pub struct MemoryDataItem {
    id: Uuid,
    title: RefCell<String>,
    data_len: Cell<usize>,
    calibration: RefCell<Calibration>,
    pub(crate) about_to_be_removed: Event<()>,
}

impl MemoryDataItem {
    /// A data item whose last dimension has `data_len` samples.
    #[must_use]
    pub fn new(data_len: usize, calibration: Calibration) -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            title: RefCell::new(String::new()),
            data_len: Cell::new(data_len),
            calibration: RefCell::new(calibration),
            about_to_be_removed: Event::new(),
        })
    }

    pub fn set_data_len(&self, data_len: usize) {
        self.data_len.set(data_len);
    }

    pub fn set_calibration(&self, calibration: Calibration) {
        *self.calibration.borrow_mut() = calibration;
    }
}

impl HostObject for MemoryDataItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_be_removed.subscribe(move |()| callback())
    }
}

impl DataItem for MemoryDataItem {
    fn title(&self) -> String {
        self.title.borrow().clone()
    }

    fn set_title(&self, title: &str) {
        *self.title.borrow_mut() = title.to_owned();
    }

    fn data_len(&self) -> usize {
        self.data_len.get()
    }

    fn calibration(&self) -> Calibration {
        self.calibration.borrow().clone()
    }
}

impl fmt::Debug for MemoryDataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDataItem")
            .field("id", &self.id)
            .field("title", &self.title.borrow())
            .field("data_len", &self.data_len.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryIntervalGraphic
// ---------------------------------------------------------------------------

pub struct MemoryIntervalGraphic {
    id: Uuid,
    interval: Cell<FractionalInterval>,
    writes: Cell<usize>,
    property_changed: Event<&'static str>,
    pub(crate) about_to_be_removed: Event<()>,
}

impl MemoryIntervalGraphic {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            interval: Cell::new((0.0, 1.0)),
            writes: Cell::new(0),
            property_changed: Event::new(),
            about_to_be_removed: Event::new(),
        })
    }

    /// Number of `set_interval` calls that changed the value.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl HostObject for MemoryIntervalGraphic {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_be_removed.subscribe(move |()| callback())
    }
}

impl IntervalGraphic for MemoryIntervalGraphic {
    fn interval(&self) -> FractionalInterval {
        self.interval.get()
    }

    fn set_interval(&self, interval: FractionalInterval) {
        if self.interval.get() == interval {
            return;
        }
        self.interval.set(interval);
        self.writes.set(self.writes.get() + 1);
        self.property_changed.notify(&INTERVAL_PROPERTY);
    }

    fn on_property_changed(&self, callback: Box<dyn Fn(&str)>) -> Subscription {
        self.property_changed.subscribe(move |name| callback(name))
    }
}

impl fmt::Debug for MemoryIntervalGraphic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIntervalGraphic")
            .field("id", &self.id)
            .field("interval", &self.interval.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryDisplayItem
// ---------------------------------------------------------------------------

pub struct MemoryDisplayItem {
    id: Uuid,
    document: Weak<MemoryDocument>,
    graphics: RefCell<Vec<Rc<MemoryIntervalGraphic>>>,
    data_channels: RefCell<Vec<Rc<dyn DataItem>>>,
    layers: RefCell<Vec<DisplayLayer>>,
    properties: RefCell<BTreeMap<String, String>>,
    pub(crate) about_to_be_removed: Event<()>,
}

impl MemoryDisplayItem {
    pub(crate) fn new(document: Weak<MemoryDocument>, data_item: Rc<dyn DataItem>) -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            document,
            graphics: RefCell::new(Vec::new()),
            data_channels: RefCell::new(vec![data_item]),
            layers: RefCell::new(vec![DisplayLayer::default()]),
            properties: RefCell::new(BTreeMap::new()),
            about_to_be_removed: Event::new(),
        })
    }

    /// Concrete handles to the attached graphics.
    #[must_use]
    pub fn interval_graphics(&self) -> Vec<Rc<MemoryIntervalGraphic>> {
        self.graphics.borrow().clone()
    }

    #[must_use]
    pub fn graphic_count(&self) -> usize {
        self.graphics.borrow().len()
    }

    #[must_use]
    pub fn data_channel_count(&self) -> usize {
        self.data_channels.borrow().len()
    }

    /// Drop channels (and the layers drawing them) that show `data_item_id`.
    pub(crate) fn detach_data_item(&self, data_item_id: Uuid) {
        let removed: Vec<usize> = {
            let channels = self.data_channels.borrow();
            channels
                .iter()
                .enumerate()
                .filter(|(_, item)| item.id() == data_item_id)
                .map(|(index, _)| index)
                .collect()
        };
        for index in removed.into_iter().rev() {
            self.data_channels.borrow_mut().remove(index);
            let mut layers = self.layers.borrow_mut();
            layers.retain(|layer| layer.data_index != index);
            for layer in layers.iter_mut() {
                if layer.data_index > index {
                    layer.data_index -= 1;
                }
            }
        }
    }

    pub(crate) fn remove_all_graphics(&self) {
        for graphic in self.interval_graphics() {
            self.remove_graphic(&*graphic);
        }
    }
}

impl HostObject for MemoryDisplayItem {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription {
        self.about_to_be_removed.subscribe(move |()| callback())
    }
}

impl DisplayItem for MemoryDisplayItem {
    fn add_interval_graphic(&self) -> Rc<dyn IntervalGraphic> {
        let graphic = MemoryIntervalGraphic::new();
        self.graphics.borrow_mut().push(Rc::clone(&graphic));
        graphic
    }

    fn remove_graphic(&self, graphic: &dyn IntervalGraphic) {
        let id = graphic.id();
        let found = self
            .graphics
            .borrow()
            .iter()
            .find(|g| g.id == id)
            .cloned();
        let Some(graphic) = found else {
            return;
        };
        let document = self.document.upgrade();
        if let Some(document) = &document {
            if !document.begin_removal(id) {
                return;
            }
        }

        graphic.about_to_be_removed.notify(&());
        self.graphics.borrow_mut().retain(|g| g.id != id);
        tracing::trace!(graphic = %id, display = %self.id, "graphic removed");

        if let Some(document) = document {
            document.cascade_graphic_removal(id);
            document.end_removal(id);
        }
    }

    fn graphics(&self) -> Vec<Rc<dyn IntervalGraphic>> {
        self.graphics
            .borrow()
            .iter()
            .map(|g| Rc::clone(g) as Rc<dyn IntervalGraphic>)
            .collect()
    }

    fn display_data_channel_index(&self, data_item: &dyn DataItem) -> Option<usize> {
        let id = data_item.id();
        self.data_channels
            .borrow()
            .iter()
            .position(|item| item.id() == id)
    }

    fn append_display_data_channel(&self, data_item: Rc<dyn DataItem>) -> usize {
        let mut channels = self.data_channels.borrow_mut();
        channels.push(data_item);
        channels.len() - 1
    }

    fn display_layers(&self) -> Vec<DisplayLayer> {
        self.layers.borrow().clone()
    }

    fn insert_display_layer(&self, index: usize, layer: DisplayLayer) {
        let mut layers = self.layers.borrow_mut();
        let index = index.min(layers.len());
        layers.insert(index, layer);
    }

    fn set_display_property(&self, name: &str, value: &str) {
        self.properties
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
    }

    fn display_property(&self, name: &str) -> Option<String> {
        self.properties.borrow().get(name).cloned()
    }
}

impl fmt::Debug for MemoryDisplayItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDisplayItem")
            .field("id", &self.id)
            .field("graphics", &self.graphics.borrow().len())
            .field("data_channels", &self.data_channels.borrow().len())
            .finish()
    }
}
