//! Toolbar placement.
//!
//! The toolbar rests against one viewport edge at a `ratio` along it. The
//! ratio (not a pixel position) is what is persisted, so a resize keeps the
//! toolbar at the same relative spot.

pub mod anchor;
pub mod snap;

use pagegrab_core::models::toolbar::{Edge, ToolbarState};
use pagegrab_core::{Point, Rect, Size};
use snap::VelocityTracker;
use std::time::{Duration, Instant};
use tracing::debug;

/// Expanded toolbar size when docked to a horizontal edge.
pub const TOOLBAR_EXPANDED: Size = Size::new(240.0, 40.0);
/// Collapsed toolbar size when docked to a horizontal edge.
pub const TOOLBAR_COLLAPSED: Size = Size::new(40.0, 40.0);
pub const SNAP_ANIMATION: Duration = Duration::from_millis(200);

fn available(edge: Edge, size: Size, viewport: Size, margin: f32) -> f32 {
    if edge.is_horizontal() {
        viewport.width - size.width - margin * 2.0
    } else {
        viewport.height - size.height - margin * 2.0
    }
}

/// Ratio along `edge` for a toolbar whose top-left corner is at `position`.
pub fn ratio_from_position(edge: Edge, position: Point, size: Size, viewport: Size, margin: f32) -> f32 {
    let span = available(edge, size, viewport, margin);
    if span <= 0.0 {
        return 0.5;
    }
    let offset = if edge.is_horizontal() { position.x } else { position.y };
    ((offset - margin) / span).clamp(0.0, 1.0)
}

/// Top-left corner of a toolbar at `ratio` along `edge`.
pub fn position_from_ratio(edge: Edge, ratio: f32, size: Size, viewport: Size, margin: f32) -> Point {
    let span = available(edge, size, viewport, margin);
    let along = if span <= 0.0 {
        if edge.is_horizontal() {
            (viewport.width - size.width) / 2.0
        } else {
            (viewport.height - size.height) / 2.0
        }
    } else {
        margin + ratio.clamp(0.0, 1.0) * span
    };
    match edge {
        Edge::Top => Point::new(along, margin),
        Edge::Bottom => Point::new(along, viewport.height - size.height - margin),
        Edge::Left => Point::new(margin, along),
        Edge::Right => Point::new(viewport.width - size.width - margin, along),
    }
}

#[derive(Debug, Clone)]
struct ToolbarDrag {
    grab_offset: Point,
    position: Point,
    tracker: VelocityTracker,
}

#[derive(Debug, Clone, Copy)]
struct SnapAnimation {
    from: Point,
    to: Point,
    started_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ToolbarLayout {
    state: ToolbarState,
    expanded: Size,
    collapsed: Size,
    viewport: Size,
    margin: f32,
    projection_ms: f32,
    drag: Option<ToolbarDrag>,
    animation: Option<SnapAnimation>,
}

impl ToolbarLayout {
    pub fn new(state: ToolbarState, viewport: Size, margin: f32, projection_ms: f32) -> Self {
        Self {
            state: state.normalized(),
            expanded: TOOLBAR_EXPANDED,
            collapsed: TOOLBAR_COLLAPSED,
            viewport,
            margin,
            projection_ms,
            drag: None,
            animation: None,
        }
    }

    pub fn state(&self) -> ToolbarState {
        self.state
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    fn size_for(&self, edge: Edge, collapsed: bool) -> Size {
        let base = if collapsed { self.collapsed } else { self.expanded };
        if edge.is_horizontal() {
            base
        } else {
            Size::new(base.height, base.width)
        }
    }

    pub fn size(&self) -> Size {
        self.size_for(self.state.edge, self.state.collapsed)
    }

    /// Where the toolbar rests for the current state.
    pub fn rest_position(&self) -> Point {
        position_from_ratio(self.state.edge, self.state.ratio, self.size(), self.viewport, self.margin)
    }

    /// Rectangle at `now`, following a drag or an in-flight snap animation.
    pub fn rect_at(&self, now: Instant) -> Rect {
        let size = self.size();
        let position = if let Some(drag) = &self.drag {
            drag.position
        } else if let Some(animation) = &self.animation {
            let elapsed = now.saturating_duration_since(animation.started_at);
            let t = (elapsed.as_secs_f32() / SNAP_ANIMATION.as_secs_f32()).min(1.0);
            let eased = 1.0 - (1.0 - t).powi(3);
            Point::new(
                animation.from.x + (animation.to.x - animation.from.x) * eased,
                animation.from.y + (animation.to.y - animation.from.y) * eased,
            )
        } else {
            self.rest_position()
        };
        Rect::new(position.x, position.y, size.width, size.height)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.animation
            .is_some_and(|animation| now.saturating_duration_since(animation.started_at) < SNAP_ANIMATION)
    }

    /// Drop a finished animation.
    pub fn settle_animation(&mut self, now: Instant) {
        if !self.is_animating(now) {
            self.animation = None;
        }
    }

    pub fn begin_drag(&mut self, pointer: Point, now: Instant) {
        let rect = self.rect_at(now);
        let mut tracker = VelocityTracker::new();
        tracker.push(now, pointer);
        self.animation = None;
        self.drag = Some(ToolbarDrag {
            grab_offset: Point::new(pointer.x - rect.x, pointer.y - rect.y),
            position: Point::new(rect.x, rect.y),
            tracker,
        });
    }

    /// Follow the pointer; the toolbar stays inside the viewport.
    pub fn drag_to(&mut self, pointer: Point, now: Instant) -> Option<Point> {
        let size = self.size();
        let viewport = self.viewport;
        let drag = self.drag.as_mut()?;
        drag.tracker.push(now, pointer);
        let max_x = (viewport.width - size.width).max(0.0);
        let max_y = (viewport.height - size.height).max(0.0);
        drag.position = Point::new(
            (pointer.x - drag.grab_offset.x).clamp(0.0, max_x),
            (pointer.y - drag.grab_offset.y).clamp(0.0, max_y),
        );
        Some(drag.position)
    }

    /// Release: snap to the edge the projected release point is nearest to
    /// and animate there.
    ///
    /// # Returns
    /// The new state when the placement changed.
    pub fn end_drag(&mut self, now: Instant) -> Option<ToolbarState> {
        let drag = self.drag.take()?;
        let size = self.size();
        let center = Point::new(drag.position.x + size.width / 2.0, drag.position.y + size.height / 2.0);
        let velocity = drag.tracker.velocity();
        let edge = snap::snap_edge(center, velocity, self.viewport, self.projection_ms);

        let snapped_size = self.size_for(edge, self.state.collapsed);
        let corner = Point::new(
            center.x - snapped_size.width / 2.0,
            center.y - snapped_size.height / 2.0,
        );
        let ratio = ratio_from_position(edge, corner, snapped_size, self.viewport, self.margin);
        let previous = self.state;
        self.state.edge = edge;
        self.state.ratio = ratio;
        self.animation = Some(SnapAnimation {
            from: drag.position,
            to: self.rest_position(),
            started_at: now,
        });
        debug!(
            target: "pagegrab_engine::placement",
            edge = ?edge,
            ratio,
            vx = velocity.x,
            vy = velocity.y,
            "toolbar snapped"
        );
        (previous != self.state).then_some(self.state)
    }

    /// Collapse or expand, keeping the toolbar's center where it was along
    /// its edge.
    pub fn set_collapsed(&mut self, collapsed: bool) -> bool {
        if self.state.collapsed == collapsed {
            return false;
        }
        let rest = self.rest_position();
        let size = self.size();
        let center = Point::new(rest.x + size.width / 2.0, rest.y + size.height / 2.0);
        let edge = self.state.edge;
        let new_size = self.size_for(edge, collapsed);
        let corner = Point::new(center.x - new_size.width / 2.0, center.y - new_size.height / 2.0);
        self.state.ratio = ratio_from_position(edge, corner, new_size, self.viewport, self.margin);
        self.state.collapsed = collapsed;
        self.animation = None;
        true
    }

    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.state.enabled == enabled {
            return false;
        }
        self.state.enabled = enabled;
        true
    }

    /// Re-layout after a viewport resize. The ratio is kept.
    pub fn resize(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.animation = None;
        let size = self.size();
        if let Some(drag) = self.drag.as_mut() {
            drag.position.x = drag.position.x.min((viewport.width - size.width).max(0.0));
            drag.position.y = drag.position.y.min((viewport.height - size.height).max(0.0));
        }
    }
}
