//! In-memory host tree.
//!
//! Stands in for a live UI tree in tests and scripted replays. Elements are
//! kept in document order; later siblings paint above earlier ones and
//! children paint above their parents.

use crate::element::{ElementGeometry, ElementId, ElementInfo, ElementTree};
use crate::geometry::{Point, Rect, Transform};
use serde::Deserialize;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Element description accepted by [`MemoryTree::insert`].
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryElement {
    pub id: u64,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub component: Option<String>,
    pub rect: Rect,
    #[serde(default)]
    pub border_radius: f32,
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default = "default_true")]
    pub eligible: bool,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_tag() -> String {
    "div".to_string()
}

fn default_true() -> bool {
    true
}

impl MemoryElement {
    pub fn new(id: u64, tag: &str, rect: Rect) -> Self {
        Self {
            id,
            parent: None,
            tag: tag.to_string(),
            component: None,
            rect,
            border_radius: 0.0,
            transform: None,
            eligible: true,
            selector: None,
            text: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<u64>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn ineligible(mut self) -> Self {
        self.eligible = false;
        self
    }
}

#[derive(Debug)]
struct Node {
    element: MemoryElement,
    attached: bool,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
}

impl Inner {
    fn node(&self, id: ElementId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.element.id == id.0)
    }

    fn node_mut(&mut self, id: ElementId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.element.id == id.0)
    }

    /// Attached only when the node and every ancestor are attached.
    fn is_attached(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            match self.node(id) {
                Some(node) if node.attached => current = node.element.parent.map(ElementId),
                _ => return false,
            }
        }
        true
    }

    fn depth(&self, id: ElementId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).and_then(|node| node.element.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.node(ElementId(parent)).and_then(|node| node.element.parent);
        }
        depth
    }
}

/// Thread-safe in-memory [`ElementTree`].
#[derive(Debug, Default)]
pub struct MemoryTree {
    inner: RwLock<Inner>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from elements listed in document order.
    pub fn from_elements(elements: impl IntoIterator<Item = MemoryElement>) -> Self {
        let tree = Self::new();
        for element in elements {
            tree.insert(element);
        }
        tree
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an element (replacing any element with the same id).
    pub fn insert(&self, element: MemoryElement) -> ElementId {
        let id = ElementId(element.id);
        let mut inner = self.write();
        inner.nodes.retain(|node| node.element.id != element.id);
        inner.nodes.push(Node {
            element,
            attached: true,
        });
        id
    }

    /// Removes an element (and, implicitly, its subtree) from the live tree.
    pub fn detach(&self, id: ElementId) -> bool {
        match self.write().node_mut(id) {
            Some(node) => {
                node.attached = false;
                true
            }
            None => false,
        }
    }

    pub fn reattach(&self, id: ElementId) -> bool {
        match self.write().node_mut(id) {
            Some(node) => {
                node.attached = true;
                true
            }
            None => false,
        }
    }

    pub fn set_rect(&self, id: ElementId, rect: Rect) -> bool {
        match self.write().node_mut(id) {
            Some(node) => {
                node.element.rect = rect;
                true
            }
            None => false,
        }
    }

    pub fn set_eligible(&self, id: ElementId, eligible: bool) -> bool {
        match self.write().node_mut(id) {
            Some(node) => {
                node.element.eligible = eligible;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }
}

impl ElementTree for MemoryTree {
    fn is_attached(&self, id: ElementId) -> bool {
        self.read().is_attached(id)
    }

    fn is_eligible(&self, id: ElementId) -> bool {
        self.read()
            .node(id)
            .map(|node| node.element.eligible)
            .unwrap_or(false)
    }

    fn geometry(&self, id: ElementId) -> Option<ElementGeometry> {
        let inner = self.read();
        if !inner.is_attached(id) {
            return None;
        }
        inner.node(id).map(|node| ElementGeometry {
            rect: node.element.rect,
            border_radius: node.element.border_radius,
            transform: node.element.transform,
        })
    }

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.read()
            .node(id)
            .and_then(|node| node.element.parent)
            .map(ElementId)
    }

    fn elements_from_point(&self, point: Point) -> Vec<ElementId> {
        let inner = self.read();
        let mut hits: Vec<(usize, usize, ElementId)> = inner
            .nodes
            .iter()
            .enumerate()
            .map(|(order, node)| (order, ElementId(node.element.id)))
            .filter(|(_, id)| inner.is_attached(*id))
            .filter(|(order, _)| inner.nodes[*order].element.rect.contains_point(point))
            .map(|(order, id)| (inner.depth(id), order, id))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, _, id)| id).collect()
    }

    fn candidates(&self) -> Vec<ElementId> {
        let inner = self.read();
        inner
            .nodes
            .iter()
            .map(|node| ElementId(node.element.id))
            .filter(|id| inner.is_attached(*id))
            .collect()
    }

    fn describe(&self, id: ElementId) -> Option<ElementInfo> {
        let inner = self.read();
        if !inner.is_attached(id) {
            return None;
        }
        let node = inner.node(id)?;
        Some(ElementInfo {
            id,
            tag_name: node.element.tag.clone(),
            component_name: node.element.component.clone(),
            selector: node
                .element
                .selector
                .clone()
                .unwrap_or_else(|| format!("[data-grab-id=\"{}\"]", node.element.id)),
            text_preview: node.element.text.clone(),
        })
    }

    fn find_by_selector(&self, selector: &str) -> Option<ElementId> {
        let inner = self.read();
        inner
            .nodes
            .iter()
            .map(|node| ElementId(node.element.id))
            .filter(|id| inner.is_attached(*id))
            .find(|id| {
                inner.node(*id).is_some_and(|node| match &node.element.selector {
                    Some(own) => own == selector,
                    None => format!("[data-grab-id=\"{}\"]", node.element.id) == selector,
                })
            })
    }
}
