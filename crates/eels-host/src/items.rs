#![forbid(unsafe_code)]

//! Data items, interval graphics and display items.

use std::rc::Rc;

use eels_core::{Calibration, FractionalInterval, Subscription};

use crate::object::HostObject;

/// Property name reported by an interval graphic when its interval moves.
pub const INTERVAL_PROPERTY: &str = "interval";

/// A data item: titled, sampled data with a calibration.
pub trait DataItem: HostObject {
    fn title(&self) -> String;
    fn set_title(&self, title: &str);

    /// Length of the last data dimension. Zero when the item has no data.
    fn data_len(&self) -> usize;

    /// Calibration of the last data dimension.
    fn calibration(&self) -> Calibration;
}

/// A draggable interval on a line-plot display, in fractional coordinates.
pub trait IntervalGraphic: HostObject {
    fn interval(&self) -> FractionalInterval;

    /// Store a new interval. Hosts notify [`INTERVAL_PROPERTY`] only when the
    /// value actually changes.
    fn set_interval(&self, interval: FractionalInterval);

    fn on_property_changed(&self, callback: Box<dyn Fn(&str)>) -> Subscription;
}

/// One stacked layer of a line-plot display.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayLayer {
    /// Index of the display data channel the layer draws.
    pub data_index: usize,
    pub label: Option<String>,
    pub fill_color: Option<String>,
}

/// A display surface that shows data channels, layers and graphics.
pub trait DisplayItem: HostObject {
    /// Create an interval graphic and attach it to this display.
    fn add_interval_graphic(&self) -> Rc<dyn IntervalGraphic>;

    /// Remove a graphic, cascading into anything that depends on it.
    /// No-op when the graphic is not on this display.
    fn remove_graphic(&self, graphic: &dyn IntervalGraphic);

    fn graphics(&self) -> Vec<Rc<dyn IntervalGraphic>>;

    /// Index of the data channel showing `data_item`, if any.
    fn display_data_channel_index(&self, data_item: &dyn DataItem) -> Option<usize>;

    /// Add a data channel for `data_item` and return its index.
    fn append_display_data_channel(&self, data_item: Rc<dyn DataItem>) -> usize;

    /// Layers in drawing order; index 0 is drawn on top.
    fn display_layers(&self) -> Vec<DisplayLayer>;

    fn insert_display_layer(&self, index: usize, layer: DisplayLayer);

    fn set_display_property(&self, name: &str, value: &str);

    fn display_property(&self, name: &str) -> Option<String>;
}
