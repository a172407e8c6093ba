//! Release-velocity projection and edge snapping.

use pagegrab_core::models::toolbar::Edge;
use pagegrab_core::{Point, Size};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Only samples this recent contribute to the release velocity.
const VELOCITY_WINDOW: Duration = Duration::from_millis(100);

/// Where a point released with `velocity` (px/ms) would land after
/// `window_ms`.
pub fn project(position: Point, velocity: Point, window_ms: f32) -> Point {
    Point::new(
        position.x + velocity.x * window_ms,
        position.y + velocity.y * window_ms,
    )
}

/// Edge closest to `point`. Ties resolve in [`Edge::ALL`] order.
pub fn nearest_edge(point: Point, viewport: Size) -> Edge {
    let distance = |edge: Edge| match edge {
        Edge::Top => point.y,
        Edge::Bottom => viewport.height - point.y,
        Edge::Left => point.x,
        Edge::Right => viewport.width - point.x,
    };
    let mut best = Edge::ALL[0];
    for edge in Edge::ALL {
        if distance(edge) < distance(best) {
            best = edge;
        }
    }
    best
}

/// Edge a toolbar released at `center` with `velocity` snaps to.
pub fn snap_edge(center: Point, velocity: Point, viewport: Size, window_ms: f32) -> Edge {
    nearest_edge(project(center, velocity, window_ms), viewport)
}

/// Recent pointer samples during a toolbar drag.
#[derive(Debug, Clone, Default)]
pub struct VelocityTracker {
    samples: VecDeque<(Instant, Point)>,
}

impl VelocityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, at: Instant, point: Point) {
        self.samples.push_back((at, point));
        while let Some((oldest, _)) = self.samples.front() {
            if at.saturating_duration_since(*oldest) > VELOCITY_WINDOW && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Pixels per millisecond; zero with fewer than two distinct samples.
    pub fn velocity(&self) -> Point {
        let (Some((first_at, first)), Some((last_at, last))) = (self.samples.front(), self.samples.back()) else {
            return Point::default();
        };
        let elapsed_ms = last_at.saturating_duration_since(*first_at).as_secs_f32() * 1000.0;
        if elapsed_ms <= f32::EPSILON {
            return Point::default();
        }
        Point::new((last.x - first.x) / elapsed_ms, (last.y - first.y) / elapsed_ms)
    }
}
