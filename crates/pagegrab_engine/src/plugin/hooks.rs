//! Hook traits a plugin may implement.
//!
//! Every lifecycle method has a no-op default so a plugin only overrides
//! what it cares about. Fallible hooks return `Result`; the registry logs
//! and skips failures instead of aborting the dispatch.

use crate::snapshot::EngineSnapshot;
use pagegrab_core::{ElementInfo, GrabError, Point};

pub trait LifecycleHook: Send + Sync {
    fn on_activate(&self) {}

    fn on_deactivate(&self) {}

    fn on_element_hover(&self, _element: Option<&ElementInfo>) {}

    fn on_drag_start(&self, _origin: Point) {}

    fn on_drag_end(&self, _elements: &[ElementInfo]) {}

    fn on_before_copy(&self, _elements: &[ElementInfo]) {}

    fn on_after_copy(&self, _elements: &[ElementInfo], _success: bool) {}

    fn on_state_change(&self, _snapshot: &EngineSnapshot) {}

    fn on_prompt_mode_change(&self, _is_prompt_mode: bool) {}
}

/// Outcome of an element-select hook.
#[derive(Debug)]
pub enum SelectDecision {
    /// Let the default copy handle this element.
    Continue,
    /// The plugin handled the element. `Ok(Some(text))` contributes text to
    /// the clipboard, `Ok(None)` contributes nothing, `Err` fails the copy.
    Intercept(Result<Option<String>, GrabError>),
}

pub trait ElementSelectHook: Send + Sync {
    fn on_element_select(&self, element: &ElementInfo) -> SelectDecision;
}

/// Rewrites clipboard content before it is written. Transforms chain in
/// registration order.
pub trait CopyTransformHook: Send + Sync {
    fn transform(&self, content: String, elements: &[ElementInfo]) -> Result<String, GrabError>;
}

pub trait CopyResultHook: Send + Sync {
    fn on_copy_success(&self, _content: &str, _elements: &[ElementInfo]) {}

    fn on_copy_error(&self, _message: &str) {}
}
