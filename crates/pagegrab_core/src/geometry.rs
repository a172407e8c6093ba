//! Pure geometry and hit-testing helpers.
//!
//! None of these functions fail: a detached or unknown element yields `None`
//! or is skipped, and an empty region yields an empty list.

use crate::constants::DRAG_STRICT_COVERAGE;
use crate::element::{ElementId, ElementTree};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle. `width`/`height` are never negative once built
/// through [`Rect::from_corners`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized rectangle spanning two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        is_point_in_rect(point, self)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Overlapping area, or `None` when the rectangles only touch or miss.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > left && bottom > top {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// 2D affine transform (`matrix(a, b, c, d, e, f)`), carried through so a
/// renderer can apply the same transform to the feedback box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Visible window onto the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub scroll_x: f32,
    #[serde(default)]
    pub scroll_y: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Viewport-space rectangle of the window itself.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    pub fn page_to_viewport(&self, rect: &Rect) -> Rect {
        rect.translate(-self.scroll_x, -self.scroll_y)
    }

    pub fn viewport_to_page(&self, point: Point) -> Point {
        Point::new(point.x + self.scroll_x, point.y + self.scroll_y)
    }
}

/// Feedback-box geometry in viewport coordinates. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub border_radius: f32,
    pub transform: Option<Transform>,
}

impl OverlayBounds {
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            border_radius: 0.0,
            transform: None,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

pub fn is_point_in_rect(point: Point, rect: &Rect) -> bool {
    point.x >= rect.x && point.x <= rect.right() && point.y >= rect.y && point.y <= rect.bottom()
}

/// Viewport-relative bounds of an element, or `None` if it is detached.
pub fn bounds_of(tree: &dyn ElementTree, id: ElementId, viewport: &Viewport) -> Option<OverlayBounds> {
    if !tree.is_attached(id) {
        return None;
    }
    let geometry = tree.geometry(id)?;
    let rect = viewport.page_to_viewport(&geometry.rect);
    Some(OverlayBounds {
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
        border_radius: geometry.border_radius,
        transform: geometry.transform.filter(|transform| !transform.is_identity()),
    })
}

/// Smallest bounds enclosing every input.
///
/// A single input is returned as-is (radius and transform preserved); a union
/// of several boxes is a plain rectangle.
pub fn union_of(bounds: &[OverlayBounds]) -> Option<OverlayBounds> {
    match bounds {
        [] => None,
        [single] => Some(*single),
        [first, rest @ ..] => {
            let rect = rest
                .iter()
                .fold(first.rect(), |acc, next| acc.union(&next.rect()));
            Some(OverlayBounds::from_rect(rect))
        }
    }
}

/// Union of the bounds of every still-attached element in `ids`.
pub fn selection_bounds(
    tree: &dyn ElementTree,
    ids: &[ElementId],
    viewport: &Viewport,
) -> Option<OverlayBounds> {
    let bounds: Vec<OverlayBounds> = ids
        .iter()
        .filter_map(|id| bounds_of(tree, *id, viewport))
        .collect();
    union_of(&bounds)
}

fn coverage(element: &Rect, region: &Rect) -> f32 {
    let area = element.area();
    if area <= 0.0 {
        return 0.0;
    }
    region
        .intersection(element)
        .map(|overlap| overlap.area() / area)
        .unwrap_or(0.0)
}

fn region_pass(
    tree: &dyn ElementTree,
    region: &Rect,
    is_eligible: &dyn Fn(ElementId) -> bool,
    strict: bool,
) -> Vec<(ElementId, Rect)> {
    tree.candidates()
        .into_iter()
        .filter(|id| tree.is_attached(*id) && is_eligible(*id))
        .filter_map(|id| tree.geometry(id).map(|geometry| (id, geometry.rect)))
        .filter(|(_, rect)| {
            if strict {
                region.contains_rect(rect) || coverage(rect, region) >= DRAG_STRICT_COVERAGE
            } else {
                region.intersection(rect).is_some()
            }
        })
        .collect()
}

fn drop_nested(tree: &dyn ElementTree, found: Vec<(ElementId, Rect)>) -> Vec<ElementId> {
    let ids: Vec<ElementId> = found.iter().map(|(id, _)| *id).collect();
    ids.iter()
        .copied()
        .filter(|id| !ids.iter().any(|other| other != id && tree.is_ancestor(*other, *id)))
        .collect()
}

/// Eligible elements materially inside a page-space `region`.
///
/// With `strict` an element must be fully (or at least
/// [`DRAG_STRICT_COVERAGE`]) inside the region; nested matches collapse to
/// their outermost element. If that finds nothing, or when `strict` is false,
/// any overlap counts: elements that merely enclose the region are skipped
/// unless nothing else overlaps, in which case the innermost enclosing element
/// is returned so a drag over a sparse layout is never silently empty.
pub fn elements_in_region(
    tree: &dyn ElementTree,
    region: Rect,
    is_eligible: &dyn Fn(ElementId) -> bool,
    strict: bool,
) -> Vec<ElementId> {
    if strict {
        let found = region_pass(tree, &region, is_eligible, true);
        if !found.is_empty() {
            return drop_nested(tree, found);
        }
    }

    let overlapping = region_pass(tree, &region, is_eligible, false);
    if overlapping.is_empty() {
        return Vec::new();
    }
    let (enclosing, partial): (Vec<_>, Vec<_>) = overlapping
        .into_iter()
        .partition(|(_, rect)| rect.contains_rect(&region));
    if !partial.is_empty() {
        return drop_nested(tree, partial);
    }
    // Document order puts descendants after ancestors, so the last enclosing
    // element is the innermost one.
    enclosing
        .iter()
        .rev()
        .find(|(id, _)| {
            !enclosing
                .iter()
                .any(|(other, _)| other != id && tree.is_ancestor(*id, *other))
        })
        .map(|(id, _)| vec![*id])
        .unwrap_or_default()
}

/// Topmost eligible element at a page-space point.
pub fn point_on_element(
    tree: &dyn ElementTree,
    point: Point,
    is_eligible: &dyn Fn(ElementId) -> bool,
) -> Option<ElementId> {
    tree.elements_from_point(point)
        .into_iter()
        .find(|id| tree.is_attached(*id) && is_eligible(*id))
}

/// Moves `rect` inside `bounds` (shrinking it if it does not fit).
pub fn clamp_rect(rect: Rect, bounds: &Rect) -> Rect {
    let width = rect.width.min(bounds.width).max(0.0);
    let height = rect.height.min(bounds.height).max(0.0);
    let x = rect.x.clamp(bounds.x, (bounds.right() - width).max(bounds.x));
    let y = rect.y.clamp(bounds.y, (bounds.bottom() - height).max(bounds.y));
    Rect::new(x, y, width, height)
}

/// Keeps a viewport-space rectangle inside the viewport, respecting `margin`.
pub fn clamp_to_viewport(rect: Rect, viewport: &Viewport, margin: f32) -> Rect {
    let inner = Rect::new(
        margin,
        margin,
        (viewport.width - margin * 2.0).max(0.0),
        (viewport.height - margin * 2.0).max(0.0),
    );
    clamp_rect(rect, &inner)
}
