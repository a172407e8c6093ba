//! Floating panels anchored to the toolbar.
//!
//! While any panel is open its rectangle is recomputed every animation
//! frame, because the toolbar itself may be moving (snap animation, resize).
//! Dismissing the last panel stops tracking immediately.

use pagegrab_core::geometry::clamp_to_viewport;
use pagegrab_core::models::toolbar::Edge;
use pagegrab_core::{Rect, Size, Viewport};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    History,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanelPlacement {
    pub kind: PanelKind,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy)]
struct OpenPanel {
    kind: PanelKind,
    size: Size,
    rect: Option<Rect>,
}

/// Rectangle for a panel next to `toolbar`, on the side facing the page.
pub fn place_panel(size: Size, toolbar: Rect, edge: Edge, viewport: &Viewport, gap: f32) -> Rect {
    let center = toolbar.center();
    let (x, y) = match edge {
        Edge::Bottom => (center.x - size.width / 2.0, toolbar.y - gap - size.height),
        Edge::Top => (center.x - size.width / 2.0, toolbar.bottom() + gap),
        Edge::Left => (toolbar.right() + gap, center.y - size.height / 2.0),
        Edge::Right => (toolbar.x - gap - size.width, center.y - size.height / 2.0),
    };
    clamp_to_viewport(Rect::new(x, y, size.width, size.height), viewport, gap)
}

#[derive(Debug, Default)]
pub struct AnchorTracker {
    panels: Vec<OpenPanel>,
    frames: u64,
}

impl AnchorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or resize) a panel. It is placed on the next frame.
    pub fn open(&mut self, kind: PanelKind, size: Size) {
        match self.panels.iter_mut().find(|panel| panel.kind == kind) {
            Some(panel) => panel.size = size,
            None => self.panels.push(OpenPanel {
                kind,
                size,
                rect: None,
            }),
        }
    }

    pub fn dismiss(&mut self, kind: PanelKind) -> bool {
        let before = self.panels.len();
        self.panels.retain(|panel| panel.kind != kind);
        before != self.panels.len()
    }

    pub fn dismiss_all(&mut self) {
        self.panels.clear();
    }

    pub fn is_open(&self, kind: PanelKind) -> bool {
        self.panels.iter().any(|panel| panel.kind == kind)
    }

    pub fn is_tracking(&self) -> bool {
        !self.panels.is_empty()
    }

    /// Frames processed while tracking.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Recompute every open panel against the toolbar's current rectangle.
    ///
    /// # Returns
    /// `true` if any panel moved.
    pub fn on_frame(&mut self, toolbar: Rect, edge: Edge, viewport: &Viewport, gap: f32) -> bool {
        if self.panels.is_empty() {
            return false;
        }
        self.frames = self.frames.wrapping_add(1);
        let mut moved = false;
        for panel in &mut self.panels {
            let rect = place_panel(panel.size, toolbar, edge, viewport, gap);
            if panel.rect != Some(rect) {
                panel.rect = Some(rect);
                moved = true;
            }
        }
        moved
    }

    /// Placed panels (a panel opened since the last frame is not listed yet).
    pub fn placements(&self) -> Vec<PanelPlacement> {
        self.panels
            .iter()
            .filter_map(|panel| panel.rect.map(|rect| PanelPlacement { kind: panel.kind, rect }))
            .collect()
    }
}
