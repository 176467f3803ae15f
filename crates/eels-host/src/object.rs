#![forbid(unsafe_code)]

//! Identity and lifecycle shared by every host object.

use std::fmt;
use std::rc::Rc;

use eels_core::Subscription;
use uuid::Uuid;

use crate::items::{DataItem, DisplayItem, IntervalGraphic};

/// Something the host document owns and may delete at any time.
pub trait HostObject {
    /// Stable identity, used for membership tests and persisted references.
    fn id(&self) -> Uuid;

    /// Called once, right before the object is removed from its document.
    fn on_about_to_be_removed(&self, callback: Box<dyn Fn()>) -> Subscription;
}

/// A typed, non-owning-by-contract reference to a host object.
///
/// Used for record references and computation bindings.
#[derive(Clone)]
pub enum HostObjectRef {
    DataItem(Rc<dyn DataItem>),
    DisplayItem(Rc<dyn DisplayItem>),
    Graphic(Rc<dyn IntervalGraphic>),
}

impl HostObjectRef {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::DataItem(item) => item.id(),
            Self::DisplayItem(item) => item.id(),
            Self::Graphic(graphic) => graphic.id(),
        }
    }

    #[must_use]
    pub fn as_data_item(&self) -> Option<&Rc<dyn DataItem>> {
        match self {
            Self::DataItem(item) => Some(item),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_display_item(&self) -> Option<&Rc<dyn DisplayItem>> {
        match self {
            Self::DisplayItem(item) => Some(item),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_graphic(&self) -> Option<&Rc<dyn IntervalGraphic>> {
        match self {
            Self::Graphic(graphic) => Some(graphic),
            _ => None,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::DataItem(_) => "DataItem",
            Self::DisplayItem(_) => "DisplayItem",
            Self::Graphic(_) => "Graphic",
        }
    }
}

impl PartialEq for HostObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for HostObjectRef {}

impl fmt::Debug for HostObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.id())
    }
}
