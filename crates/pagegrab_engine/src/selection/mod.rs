//! Selection engine: what the overlay points at.
//!
//! Holds the hovered target, the frozen multi-selection, the forming drag
//! marquee and the feedback board. Element handles are re-validated against
//! the host tree on every read; nothing here keeps an element alive.

pub mod feedback;
pub mod navigation;

use crate::activation::Direction;
use feedback::{FeedbackBoard, FeedbackTiming};
use pagegrab_core::geometry::{elements_in_region, selection_bounds};
use pagegrab_core::{Config, ElementId, ElementTree, OverlayBounds, Point, Rect, Viewport};
use std::time::{Duration, Instant};
use tracing::debug;

/// A hit test handed out by [`SelectionEngine::pointer_moved`].
///
/// Results are applied with [`SelectionEngine::apply_hit_test`]; a ticket
/// whose version has been superseded or that is older than the staleness
/// window is discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTestTicket {
    pub version: u64,
    /// Page-space point to test.
    pub point: Point,
    pub issued_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragSelection {
    /// Page-space corners.
    pub origin: Point,
    pub current: Point,
    /// Debounced live preview of what the marquee would select.
    pub preview: Vec<ElementId>,
}

impl DragSelection {
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.origin, self.current)
    }
}

#[derive(Debug)]
pub struct SelectionEngine {
    hovered: Option<ElementId>,
    hit_version: u64,
    last_hit_test_at: Option<Instant>,
    trailing_point: Option<Point>,
    frozen: Vec<ElementId>,
    drag: Option<DragSelection>,
    revision: u64,
    bounds_cache: Option<BoundsCache>,
    pub feedback: FeedbackBoard,
}

#[derive(Debug, Clone)]
struct BoundsCache {
    viewport_version: u64,
    revision: u64,
    ids: Vec<ElementId>,
    bounds: Option<OverlayBounds>,
}

impl SelectionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            hovered: None,
            hit_version: 0,
            last_hit_test_at: None,
            trailing_point: None,
            frozen: Vec::new(),
            drag: None,
            revision: 0,
            bounds_cache: None,
            feedback: FeedbackBoard::new(FeedbackTiming {
                fade_delay: config.label_fade_delay(),
                fade_duration: config.label_fade_duration(),
                box_ttl: config.grabbed_box_ttl(),
            }),
        }
    }

    /// Bumped whenever the hovered target or frozen set changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Throttled hit-test request for a page-space pointer position.
    ///
    /// Inside the throttle window the point is parked as the trailing edge
    /// and `None` is returned; the caller fetches it later with
    /// [`SelectionEngine::take_trailing`].
    pub fn pointer_moved(&mut self, point: Point, now: Instant, throttle: Duration) -> Option<HitTestTicket> {
        if let Some(last) = self.last_hit_test_at {
            if now.saturating_duration_since(last) < throttle {
                self.trailing_point = Some(point);
                return None;
            }
        }
        self.trailing_point = None;
        Some(self.issue(point, now))
    }

    /// Unthrottled request, used for clicks and activation.
    pub fn hit_test_now(&mut self, point: Point, now: Instant) -> HitTestTicket {
        self.trailing_point = None;
        self.issue(point, now)
    }

    pub fn has_trailing(&self) -> bool {
        self.trailing_point.is_some()
    }

    pub fn take_trailing(&mut self, now: Instant) -> Option<HitTestTicket> {
        let point = self.trailing_point.take()?;
        Some(self.issue(point, now))
    }

    fn issue(&mut self, point: Point, now: Instant) -> HitTestTicket {
        self.hit_version = self.hit_version.wrapping_add(1);
        self.last_hit_test_at = Some(now);
        HitTestTicket {
            version: self.hit_version,
            point,
            issued_at: now,
        }
    }

    /// Apply a hit-test result. Returns `true` when the hovered target
    /// changed.
    pub fn apply_hit_test(
        &mut self,
        ticket: HitTestTicket,
        result: Option<ElementId>,
        now: Instant,
        stale_after: Duration,
    ) -> bool {
        if ticket.version != self.hit_version {
            debug!(target: "pagegrab_engine::selection", version = ticket.version, "dropping superseded hit test");
            return false;
        }
        if now.saturating_duration_since(ticket.issued_at) > stale_after {
            debug!(target: "pagegrab_engine::selection", version = ticket.version, "dropping stale hit test");
            return false;
        }
        self.set_hovered(result)
    }

    fn set_hovered(&mut self, hovered: Option<ElementId>) -> bool {
        if self.hovered == hovered {
            return false;
        }
        self.hovered = hovered;
        self.bump();
        true
    }

    /// Hovered element, if it is still attached and eligible.
    pub fn hovered(&self, tree: &dyn ElementTree) -> Option<ElementId> {
        self.hovered.filter(|id| tree.is_live_target(*id))
    }

    /// The single active element: the last frozen element when a selection
    /// is pinned, else the hovered one.
    pub fn active_element(&self, tree: &dyn ElementTree) -> Option<ElementId> {
        match self.frozen(tree).last() {
            Some(id) => Some(*id),
            None => self.hovered(tree),
        }
    }

    /// Elements an action or copy would apply to right now.
    pub fn current_selection(&self, tree: &dyn ElementTree) -> Vec<ElementId> {
        let frozen = self.frozen(tree);
        if !frozen.is_empty() {
            return frozen;
        }
        self.hovered(tree).into_iter().collect()
    }

    /// Frozen elements that are still attached.
    pub fn frozen(&self, tree: &dyn ElementTree) -> Vec<ElementId> {
        self.frozen
            .iter()
            .copied()
            .filter(|id| tree.is_attached(*id))
            .collect()
    }

    pub fn is_frozen(&self) -> bool {
        !self.frozen.is_empty()
    }

    pub fn freeze(&mut self, ids: Vec<ElementId>) {
        if self.frozen != ids {
            self.frozen = ids;
            self.bump();
        }
    }

    pub fn unfreeze(&mut self) {
        if !self.frozen.is_empty() {
            self.frozen.clear();
            self.bump();
        }
    }

    /// Forget everything except feedback entities.
    pub fn reset(&mut self) {
        self.hovered = None;
        self.trailing_point = None;
        self.drag = None;
        self.hit_version = self.hit_version.wrapping_add(1);
        self.frozen.clear();
        self.bounds_cache = None;
        self.bump();
    }

    pub fn begin_drag(&mut self, origin: Point, current: Point) {
        self.hovered = None;
        self.trailing_point = None;
        self.drag = Some(DragSelection {
            origin,
            current,
            preview: Vec::new(),
        });
        self.bump();
    }

    pub fn update_drag(&mut self, current: Point) {
        if let Some(drag) = self.drag.as_mut() {
            drag.current = current;
        }
    }

    pub fn drag(&self) -> Option<&DragSelection> {
        self.drag.as_ref()
    }

    /// Recompute the live marquee preview (debounced by the caller).
    pub fn refresh_drag_preview(&mut self, tree: &dyn ElementTree) {
        if let Some(drag) = self.drag.as_mut() {
            drag.preview = elements_in_region(tree, drag.rect(), &|id| tree.is_eligible(id), true);
        }
    }

    /// Finish the drag: compute the final set and freeze it.
    pub fn commit_drag(&mut self, tree: &dyn ElementTree, end: Point) -> Vec<ElementId> {
        let Some(mut drag) = self.drag.take() else {
            return Vec::new();
        };
        drag.current = end;
        let selected = elements_in_region(tree, drag.rect(), &|id| tree.is_eligible(id), true);
        debug!(
            target: "pagegrab_engine::selection",
            count = selected.len(),
            "drag committed"
        );
        self.freeze(selected.clone());
        selected
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            self.bump();
        }
    }

    /// Drag marquee in viewport coordinates.
    pub fn drag_bounds(&self, viewport: &Viewport) -> Option<OverlayBounds> {
        self.drag
            .as_ref()
            .map(|drag| OverlayBounds::from_rect(viewport.page_to_viewport(&drag.rect())))
    }

    /// Move the active element to its spatial neighbor and pin it.
    pub fn navigate(&mut self, tree: &dyn ElementTree, direction: Direction) -> Option<ElementId> {
        let from = self.active_element(tree)?;
        let next = navigation::find_neighbor(tree, from, direction, &|id| tree.is_eligible(id))?;
        self.freeze(vec![next]);
        Some(next)
    }

    /// Bounds of the current selection, cached per viewport version.
    pub fn selection_bounds(
        &mut self,
        tree: &dyn ElementTree,
        viewport: &Viewport,
        viewport_version: u64,
    ) -> Option<OverlayBounds> {
        let ids = self.current_selection(tree);
        if let Some(cache) = &self.bounds_cache {
            if cache.viewport_version == viewport_version && cache.revision == self.revision && cache.ids == ids {
                return cache.bounds;
            }
        }
        let bounds = selection_bounds(tree, &ids, viewport);
        self.bounds_cache = Some(BoundsCache {
            viewport_version,
            revision: self.revision,
            ids,
            bounds,
        });
        bounds
    }
}
