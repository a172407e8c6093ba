//! Host element tree contract.
//!
//! The engine never owns host elements. It holds [`ElementId`] handles and
//! asks the host tree whether a handle is still attached before every use, so
//! a removed element simply stops resolving instead of being kept alive.

use crate::geometry::{Point, Rect, Transform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-owning handle to a host element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Layout data for one element, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGeometry {
    pub rect: Rect,
    pub border_radius: f32,
    pub transform: Option<Transform>,
}

/// Descriptive data used for labels, history rows and snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: ElementId,
    pub tag_name: String,
    pub component_name: Option<String>,
    pub selector: String,
    pub text_preview: Option<String>,
}

impl ElementInfo {
    /// Name shown to the user: the component name when known, else the tag.
    pub fn display_name(&self) -> &str {
        self.component_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(self.tag_name.as_str())
    }
}

/// Host-tree predicates and lookups consumed by the engine.
pub trait ElementTree: Send + Sync {
    /// Whether the element is still part of the live tree.
    fn is_attached(&self, id: ElementId) -> bool;

    /// Whether the element may be grabbed (excludes overlay-owned nodes).
    fn is_eligible(&self, id: ElementId) -> bool;

    /// Page-space geometry, or `None` when the element is gone.
    fn geometry(&self, id: ElementId) -> Option<ElementGeometry>;

    fn parent(&self, id: ElementId) -> Option<ElementId>;

    /// Elements under a page-space point, topmost first.
    fn elements_from_point(&self, point: Point) -> Vec<ElementId>;

    /// Every attached element in document order.
    fn candidates(&self) -> Vec<ElementId>;

    fn describe(&self, id: ElementId) -> Option<ElementInfo>;

    /// Resolve a selector recorded in history back to a live element.
    fn find_by_selector(&self, _selector: &str) -> Option<ElementId> {
        None
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    fn is_ancestor(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Attached and eligible: the check every read performs before use.
    fn is_live_target(&self, id: ElementId) -> bool {
        self.is_attached(id) && self.is_eligible(id)
    }
}
