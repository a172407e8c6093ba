//! The engine runtime: owns every subsystem and the host collaborators.
//!
//! One `EngineRuntime` per overlay instance. All mutation happens through
//! its methods on the caller's thread; the only background work is agent
//! runs and source lookups, whose results are folded in by [`EngineRuntime::tick`].
//! Every entry point takes the caller's `now` and finishes by publishing a
//! snapshot if anything visible changed.

mod commands;
mod copy_flow;
mod input_flow;

use crate::action_cycle::ActionCycleState;
use crate::activation::Arbitrator;
use crate::agent::protocol::AgentProvider;
use crate::agent::AgentManager;
use crate::copy::{Clipboard, MemoryClipboard, PlainSnippetGenerator, SnippetGenerator};
use crate::history::HistoryBook;
use crate::lookup::{SourceLocator, TargetLookup};
use crate::placement::anchor::AnchorTracker;
use crate::placement::ToolbarLayout;
use crate::plugin::actions::{builtin_actions, ActionSurface};
use crate::plugin::{Plugin, PluginRegistry, BUILTIN_PLUGIN};
use crate::selection::SelectionEngine;
use crate::snapshot::{ActionView, BoxView, ContextMenuView, EngineSnapshot, LabelView};
use crate::timers::{Scheduler, TimerKind};
use pagegrab_core::{
    Config, ElementId, ElementInfo, ElementTree, HistoryStore, MemoryHistoryStore, MemoryToolbarStore,
    Point, ToolbarState, ToolbarStore, Viewport,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Host-side implementations the runtime calls out to.
pub struct Collaborators {
    pub tree: Arc<dyn ElementTree>,
    pub snippets: Box<dyn SnippetGenerator>,
    pub clipboard: Box<dyn Clipboard>,
    pub history_store: Box<dyn HistoryStore>,
    pub toolbar_store: Box<dyn ToolbarStore>,
    pub agent_provider: Option<Arc<dyn AgentProvider>>,
    pub source_locator: Option<Arc<dyn SourceLocator>>,
}

impl Collaborators {
    /// Process-local collaborators: plain snippets, an in-memory clipboard and
    /// in-memory stores, no agent provider and no source locator.
    pub fn in_memory(tree: Arc<dyn ElementTree>) -> Self {
        Self {
            tree,
            snippets: Box::new(PlainSnippetGenerator),
            clipboard: Box::new(MemoryClipboard::new()),
            history_store: Box::new(MemoryHistoryStore::new()),
            toolbar_store: Box::new(MemoryToolbarStore::new()),
            agent_provider: None,
            source_locator: None,
        }
    }
}

/// Handle returned by the subscribe calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SnapshotCallback = Box<dyn FnMut(&EngineSnapshot) + Send>;
type ToolbarCallback = Box<dyn FnMut(&ToolbarState) + Send>;

#[derive(Debug, Clone, PartialEq)]
struct ContextMenuState {
    position: Point,
    elements: Vec<ElementId>,
}

pub struct EngineRuntime {
    config: Config,
    tree: Arc<dyn ElementTree>,
    snippets: Box<dyn SnippetGenerator>,
    clipboard: Box<dyn Clipboard>,
    toolbar_store: Box<dyn ToolbarStore>,
    scheduler: Scheduler,
    arbitrator: Arbitrator,
    selection: SelectionEngine,
    history: HistoryBook,
    agents: AgentManager,
    plugins: PluginRegistry,
    toolbar: ToolbarLayout,
    anchors: AnchorTracker,
    lookup: TargetLookup,
    action_cycle: ActionCycleState,
    context_menu: Option<ContextMenuState>,
    prompt_input: String,
    /// Session a prompt submission continues, set by a follow-up.
    follow_up_session: Option<String>,
    viewport: Viewport,
    viewport_version: u64,
    /// Last pointer position in viewport coordinates.
    last_pointer: Option<Point>,
    next_subscription: u64,
    subscribers: Vec<(SubscriptionId, SnapshotCallback)>,
    toolbar_subscribers: Vec<(SubscriptionId, ToolbarCallback)>,
    last_snapshot: Option<EngineSnapshot>,
    disposed: bool,
}

impl EngineRuntime {
    /// Build a runtime, loading persisted history and toolbar placement.
    /// Store failures are logged and the runtime starts from defaults.
    pub fn new(config: Config, collaborators: Collaborators, viewport: Viewport) -> Self {
        let Collaborators {
            tree,
            snippets,
            clipboard,
            history_store,
            toolbar_store,
            agent_provider,
            source_locator,
        } = collaborators;

        let toolbar_state = match toolbar_store.load() {
            Ok(state) => state.unwrap_or_default(),
            Err(err) => {
                warn!(target: "pagegrab_engine::runtime", error = %err, "failed to load toolbar placement");
                ToolbarState::default()
            }
        };
        let mut scheduler = Scheduler::new();
        let mut arbitrator = Arbitrator::new(&config);
        if !toolbar_state.enabled {
            arbitrator.set_enabled(false, &mut scheduler);
        }

        let mut plugins = PluginRegistry::new();
        let builtin = builtin_actions()
            .into_iter()
            .fold(Plugin::new(BUILTIN_PLUGIN), Plugin::with_action);
        plugins.register_builtin(builtin);

        let history = HistoryBook::new(history_store, config.history_limit, config.history_flash());
        let toolbar = ToolbarLayout::new(
            toolbar_state,
            viewport.size(),
            config.toolbar_margin_px,
            config.snap_projection_ms,
        );
        info!(
            target: "pagegrab_engine::runtime",
            mode = ?config.activation_mode,
            history = history.items().len(),
            edge = ?toolbar_state.edge,
            "engine runtime started"
        );

        Self {
            selection: SelectionEngine::new(&config),
            config,
            tree,
            snippets,
            clipboard,
            toolbar_store,
            scheduler,
            arbitrator,
            history,
            agents: AgentManager::new(agent_provider),
            plugins,
            toolbar,
            anchors: AnchorTracker::new(),
            lookup: TargetLookup::new(source_locator),
            action_cycle: ActionCycleState::default(),
            context_menu: None,
            prompt_input: String::new(),
            follow_up_session: None,
            viewport,
            viewport_version: 0,
            last_pointer: None,
            next_subscription: 0,
            subscribers: Vec::new(),
            toolbar_subscribers: Vec::new(),
            last_snapshot: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tree(&self) -> &Arc<dyn ElementTree> {
        &self.tree
    }

    pub fn state(&self) -> crate::activation::ActivationState {
        self.arbitrator.state()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Earliest pending timer; the host should call [`EngineRuntime::tick`]
    /// no later than this.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fire every timer due at `now` (in deadline order, each handled at its
    /// own deadline) and fold in background results.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        while let Some(task) = self.scheduler.pop_due(now) {
            self.fire(task.kind, task.deadline);
        }
        let changed = self.agents.poll();
        if !changed.is_empty() {
            debug!(target: "pagegrab_engine::runtime", sessions = changed.len(), "agent sessions updated");
        }
        self.lookup.poll();
        self.publish(now);
    }

    fn fire(&mut self, kind: TimerKind, at: Instant) {
        let intents = match kind {
            TimerKind::Hold => self.arbitrator.on_hold_elapsed(&mut self.scheduler),
            TimerKind::SpamGuard => self.arbitrator.on_spam_silence(&mut self.scheduler),
            TimerKind::HiddenTabGrace => self.arbitrator.on_hidden_grace_elapsed(&mut self.scheduler),
            TimerKind::CopiedFeedback => self.arbitrator.on_copied_feedback_elapsed(&mut self.scheduler),
            TimerKind::LabelFade(id) => {
                self.selection.feedback.on_fade_due(id, at, &mut self.scheduler);
                Vec::new()
            }
            TimerKind::LabelRemove(id) => {
                self.selection.feedback.on_remove_due(id);
                Vec::new()
            }
            TimerKind::GrabbedBoxExpiry(id) => {
                self.selection.feedback.on_box_expired(id);
                Vec::new()
            }
            TimerKind::DragPreview => {
                self.selection.refresh_drag_preview(self.tree.as_ref());
                Vec::new()
            }
            TimerKind::HistoryFlash => {
                self.history.on_flash_elapsed();
                Vec::new()
            }
            TimerKind::HitTestTrailing => {
                if let Some(ticket) = self.selection.take_trailing(at) {
                    self.run_hit_test(ticket, at);
                }
                Vec::new()
            }
        };
        self.apply_intents(intents, at);
    }

    /// Advance per-frame work: anchored panels and the toolbar snap animation.
    ///
    /// # Returns
    /// `true` while another frame is needed.
    pub fn animation_frame(&mut self, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let toolbar_rect = self.toolbar.rect_at(now);
        let edge = self.toolbar.state().edge;
        self.anchors
            .on_frame(toolbar_rect, edge, &self.viewport, pagegrab_core::constants::PANEL_GAP_PX);
        let animating = self.toolbar.is_animating(now);
        if !animating {
            self.toolbar.settle_animation(now);
        }
        self.publish(now);
        animating || self.toolbar.is_dragging() || self.anchors.is_tracking()
    }

    /// Register (or replace) a plugin.
    pub fn register_plugin(&mut self, plugin: Plugin) -> Option<Plugin> {
        info!(target: "pagegrab_engine::plugin", plugin = %plugin.name, "plugin registered");
        self.plugins.register(plugin)
    }

    pub fn unregister_plugin(&mut self, name: &str) -> Option<Plugin> {
        let removed = self.plugins.unregister(name);
        if removed.is_some() {
            info!(target: "pagegrab_engine::plugin", plugin = name, "plugin unregistered");
        }
        removed
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Call `callback` with every distinct snapshot from now on.
    pub fn subscribe(&mut self, callback: impl FnMut(&EngineSnapshot) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Call `callback` whenever the persisted toolbar placement changes.
    pub fn subscribe_toolbar(&mut self, callback: impl FnMut(&ToolbarState) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription_id();
        self.toolbar_subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len() + self.toolbar_subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.toolbar_subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len() + self.toolbar_subscribers.len()
    }

    fn next_subscription_id(&mut self) -> SubscriptionId {
        self.next_subscription = self.next_subscription.wrapping_add(1);
        SubscriptionId(self.next_subscription)
    }

    /// Tear down: deactivate, cancel agent runs and timers, drop subscribers.
    /// Every later call is a no-op.
    pub fn dispose(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = self
            .arbitrator
            .deactivate(crate::activation::DeactivationReason::Disposed, &mut self.scheduler);
        self.apply_intents(intents, now);
        self.agents.shutdown();
        self.anchors.dismiss_all();
        self.lookup.clear();
        self.scheduler.clear();
        self.subscribers.clear();
        self.toolbar_subscribers.clear();
        self.disposed = true;
        info!(target: "pagegrab_engine::runtime", "engine runtime disposed");
    }

    fn describe_all(&self, ids: &[ElementId]) -> Vec<ElementInfo> {
        ids.iter().filter_map(|id| self.tree.describe(*id)).collect()
    }

    fn persist_toolbar(&mut self) {
        let state = self.toolbar.state();
        if let Err(err) = self.toolbar_store.save(&state) {
            warn!(target: "pagegrab_engine::placement", error = %err, "failed to persist toolbar placement");
        }
        for (_, callback) in &mut self.toolbar_subscribers {
            callback(&state);
        }
    }

    /// Current snapshot, built fresh.
    pub fn snapshot(&mut self, now: Instant) -> EngineSnapshot {
        let state = self.arbitrator.state();
        let tree = self.tree.as_ref();
        let dragging = state.is_dragging();
        let target_element = if state.is_visible() && !dragging {
            self.selection.active_element(tree)
        } else {
            None
        };
        let selection_bounds = if state.is_visible() && !dragging {
            self.selection
                .selection_bounds(tree, &self.viewport, self.viewport_version)
        } else {
            None
        };
        let context_menu = self.context_menu.as_ref().map(|menu| ContextMenuView {
            position: menu.position,
            elements: menu.elements.clone(),
            actions: self
                .plugins
                .actions(ActionSurface::ContextMenu)
                .filter(|action| action.is_available(menu.elements.len()))
                .map(|action| ActionView {
                    id: action.id.clone(),
                    label: action.label.clone(),
                    shortcut: action.shortcut,
                })
                .collect(),
        });

        EngineSnapshot {
            activation: state.name(),
            phase: state.phase(),
            is_active: state.is_active(),
            is_holding: state.is_holding(),
            is_dragging: dragging,
            is_copying: state.is_copying(),
            is_prompt_mode: state.is_prompt_mode(),
            is_pending_dismiss: state.is_pending_dismiss(),
            enabled: self.arbitrator.is_enabled(),
            target_element,
            frozen_elements: self.selection.frozen(tree),
            selection_bounds,
            drag_bounds: self.selection.drag_bounds(&self.viewport),
            drag_preview: self
                .selection
                .drag()
                .map(|drag| drag.preview.clone())
                .unwrap_or_default(),
            label_instances: self.selection.feedback.labels().iter().map(LabelView::from).collect(),
            grabbed_boxes: self.selection.feedback.boxes().iter().map(BoxView::from).collect(),
            toolbar_state: self.toolbar.state(),
            toolbar_rect: self.toolbar.rect_at(now),
            panels: self.anchors.placements(),
            action_cycle: self.action_cycle.clone(),
            context_menu,
            history_count: self.history.items().len(),
            has_unread_history: self.history.has_unread(),
            history_flash: self.history.is_flashing(),
            agent_sessions: self.agents.sessions().to_vec(),
            target: self.lookup.resolved().cloned(),
            prompt_input: self.prompt_input.clone(),
            theme: self.plugins.theme().clone(),
            viewport: self.viewport,
            viewport_version: self.viewport_version,
        }
    }

    /// Emit the snapshot to plugins and subscribers if it changed.
    fn publish(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let snapshot = self.snapshot(now);
        if self.last_snapshot.as_ref() == Some(&snapshot) {
            return;
        }
        self.plugins.notify_state_change(&snapshot);
        for (_, callback) in &mut self.subscribers {
            callback(&snapshot);
        }
        self.last_snapshot = Some(snapshot);
    }

    /// The most recently emitted snapshot.
    pub fn last_snapshot(&self) -> Option<&EngineSnapshot> {
        self.last_snapshot.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests;
