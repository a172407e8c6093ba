//! Keyboard navigation between spatial neighbors.

use crate::activation::Direction;
use pagegrab_core::{ElementId, ElementTree, Point};

/// Cost of drifting off-axis relative to moving along the arrow direction.
const OFF_AXIS_WEIGHT: f32 = 2.0;

fn along(direction: Direction, from: Point, to: Point) -> (f32, f32) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    match direction {
        Direction::Right => (dx, dy.abs()),
        Direction::Left => (-dx, dy.abs()),
        Direction::Down => (dy, dx.abs()),
        Direction::Up => (-dy, dx.abs()),
    }
}

/// Nearest eligible element in `direction` from `from`, by center distance.
///
/// Ancestors and descendants of `from` are skipped so navigation moves
/// between neighbors rather than in and out of the same box.
pub fn find_neighbor(
    tree: &dyn ElementTree,
    from: ElementId,
    direction: Direction,
    is_eligible: &dyn Fn(ElementId) -> bool,
) -> Option<ElementId> {
    let origin = tree.geometry(from)?.rect.center();
    let mut best: Option<(f32, ElementId)> = None;
    for candidate in tree.candidates() {
        if candidate == from
            || !tree.is_attached(candidate)
            || !is_eligible(candidate)
            || tree.is_ancestor(candidate, from)
            || tree.is_ancestor(from, candidate)
        {
            continue;
        }
        let Some(geometry) = tree.geometry(candidate) else {
            continue;
        };
        if geometry.rect.is_empty() {
            continue;
        }
        let (primary, secondary) = along(direction, origin, geometry.rect.center());
        if primary <= 0.0 {
            continue;
        }
        let score = primary + secondary * OFF_AXIS_WEIGHT;
        if best.map_or(true, |(best_score, _)| score < best_score) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, id)| id)
}
