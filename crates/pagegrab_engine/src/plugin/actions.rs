//! Context-menu and toolbar actions contributed by plugins.

use pagegrab_core::{ElementInfo, GrabError, Point};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSurface {
    ContextMenu,
    Toolbar,
    Both,
}

impl ActionSurface {
    pub fn includes(self, other: ActionSurface) -> bool {
        self == ActionSurface::Both || other == ActionSurface::Both || self == other
    }
}

/// What an action sees when it runs.
#[derive(Debug)]
pub struct ActionContext<'a> {
    pub elements: &'a [ElementInfo],
    /// Viewport position the menu was opened at, if any.
    pub position: Option<Point>,
}

/// Engine operation requested by an action. Actions never hold a reference
/// to the engine; they describe what should happen and the runtime does it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEffect {
    None,
    Copy { extra_prompt: Option<String> },
    EnterPrompt,
    Deactivate,
}

pub type ActionHandler = Arc<dyn Fn(&ActionContext<'_>) -> Result<ActionEffect, GrabError> + Send + Sync>;

#[derive(Clone)]
pub struct PluginAction {
    pub id: String,
    pub label: String,
    pub shortcut: Option<char>,
    pub surface: ActionSurface,
    pub requires_selection: bool,
    pub handler: ActionHandler,
}

impl PluginAction {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&ActionContext<'_>) -> Result<ActionEffect, GrabError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            shortcut: None,
            surface: ActionSurface::Both,
            requires_selection: true,
            handler: Arc::new(handler),
        }
    }

    pub fn with_shortcut(mut self, shortcut: char) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    pub fn on_surface(mut self, surface: ActionSurface) -> Self {
        self.surface = surface;
        self
    }

    pub fn without_selection(mut self) -> Self {
        self.requires_selection = false;
        self
    }

    /// Whether the action can run with `selected` elements.
    pub fn is_available(&self, selected: usize) -> bool {
        !self.requires_selection || selected > 0
    }

    pub fn run(&self, context: &ActionContext<'_>) -> Result<ActionEffect, GrabError> {
        (self.handler)(context)
    }
}

impl fmt::Debug for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginAction")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("shortcut", &self.shortcut)
            .field("surface", &self.surface)
            .field("requires_selection", &self.requires_selection)
            .finish_non_exhaustive()
    }
}

/// Actions registered by the engine itself.
pub fn builtin_actions() -> Vec<PluginAction> {
    vec![
        PluginAction::new("copy", "Copy", |_| Ok(ActionEffect::Copy { extra_prompt: None }))
            .with_shortcut('c'),
        PluginAction::new("comment", "Add comment", |_| Ok(ActionEffect::EnterPrompt))
            .with_shortcut('e'),
    ]
}
