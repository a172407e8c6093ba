//! Read-only view of the engine handed to renderers and subscribers.
//!
//! Built fresh after every entry point and emitted only when it differs
//! from the previously emitted one.

use crate::action_cycle::ActionCycleState;
use crate::activation::ActivePhase;
use crate::agent::protocol::AgentSession;
use crate::lookup::ResolvedTarget;
use crate::placement::anchor::PanelPlacement;
use crate::plugin::Theme;
use crate::selection::feedback::{BoxId, GrabbedBox, LabelId, LabelInstance, LabelStatus};
use pagegrab_core::{ElementId, OverlayBounds, Point, Rect, ToolbarState, Viewport};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelView {
    pub id: LabelId,
    pub bounds: OverlayBounds,
    pub tag_name: String,
    pub component_name: Option<String>,
    pub status: LabelStatus,
    pub error_message: Option<String>,
    pub hovered: bool,
}

impl From<&LabelInstance> for LabelView {
    fn from(label: &LabelInstance) -> Self {
        Self {
            id: label.id,
            bounds: label.bounds,
            tag_name: label.tag_name.clone(),
            component_name: label.component_name.clone(),
            status: label.status,
            error_message: label.error_message.clone(),
            hovered: label.hovered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxView {
    pub id: BoxId,
    pub element: ElementId,
    pub bounds: OverlayBounds,
    pub pinned: bool,
}

impl From<&GrabbedBox> for BoxView {
    fn from(grabbed: &GrabbedBox) -> Self {
        Self {
            id: grabbed.id,
            element: grabbed.element,
            bounds: grabbed.bounds,
            pinned: grabbed.is_pinned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionView {
    pub id: String,
    pub label: String,
    pub shortcut: Option<char>,
}

/// Open context menu: where it was opened and what it applies to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextMenuView {
    pub position: Point,
    pub elements: Vec<ElementId>,
    pub actions: Vec<ActionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub activation: &'static str,
    pub phase: Option<ActivePhase>,
    pub is_active: bool,
    pub is_holding: bool,
    pub is_dragging: bool,
    pub is_copying: bool,
    pub is_prompt_mode: bool,
    pub is_pending_dismiss: bool,
    pub enabled: bool,
    pub target_element: Option<ElementId>,
    pub frozen_elements: Vec<ElementId>,
    pub selection_bounds: Option<OverlayBounds>,
    pub drag_bounds: Option<OverlayBounds>,
    pub drag_preview: Vec<ElementId>,
    pub label_instances: Vec<LabelView>,
    pub grabbed_boxes: Vec<BoxView>,
    pub toolbar_state: ToolbarState,
    pub toolbar_rect: Rect,
    pub panels: Vec<PanelPlacement>,
    pub action_cycle: ActionCycleState,
    pub context_menu: Option<ContextMenuView>,
    pub history_count: usize,
    pub has_unread_history: bool,
    pub history_flash: bool,
    pub agent_sessions: Vec<AgentSession>,
    pub target: Option<ResolvedTarget>,
    pub prompt_input: String,
    pub theme: Theme,
    pub viewport: Viewport,
    pub viewport_version: u64,
}
