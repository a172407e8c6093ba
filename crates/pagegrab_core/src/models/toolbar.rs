//! Toolbar placement state.

use serde::{Deserialize, Serialize};

/// Viewport edge the toolbar is snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

    /// Top/bottom toolbars run horizontally along their edge.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Top | Edge::Bottom)
    }
}

/// Persisted toolbar placement. `ratio` is the position along the snapped
/// edge, so it survives viewport resizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolbarState {
    pub edge: Edge,
    pub ratio: f32,
    pub collapsed: bool,
    pub enabled: bool,
}

impl Default for ToolbarState {
    fn default() -> Self {
        Self {
            edge: Edge::Bottom,
            ratio: 0.5,
            collapsed: false,
            enabled: true,
        }
    }
}

impl ToolbarState {
    /// Clamps `ratio` into `0..=1`, replacing non-finite values with the center.
    pub fn normalized(mut self) -> Self {
        self.ratio = if self.ratio.is_finite() {
            self.ratio.clamp(0.0, 1.0)
        } else {
            0.5
        };
        self
    }
}
