//! Imperative commands: activation, actions, history, agent sessions and
//! toolbar placement.

use super::EngineRuntime;
use crate::activation::DeactivationReason;
use crate::agent::protocol::{AgentSession, RestoredInput};
use crate::placement::anchor::PanelKind;
use crate::plugin::actions::{ActionContext, ActionEffect, ActionSurface};
use crate::selection::feedback::LabelId;
use pagegrab_core::geometry::bounds_of;
use pagegrab_core::{ElementId, GrabError, HistoryItem, Point, Size, ToolbarState};
use std::time::Instant;
use tracing::{debug, info, warn};

impl EngineRuntime {
    pub fn activate(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = self.arbitrator.activate(&mut self.scheduler);
        self.apply_intents(intents, now);
        self.publish(now);
    }

    pub fn deactivate(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = self
            .arbitrator
            .deactivate(DeactivationReason::Command, &mut self.scheduler);
        self.apply_intents(intents, now);
        self.publish(now);
    }

    pub fn toggle(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = self.arbitrator.toggle(&mut self.scheduler);
        self.apply_intents(intents, now);
        self.publish(now);
    }

    /// Enable or disable the overlay. Disabling deactivates it; the flag is
    /// persisted with the toolbar placement.
    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = self.arbitrator.set_enabled(enabled, &mut self.scheduler);
        self.apply_intents(intents, now);
        if self.toolbar.set_enabled(enabled) {
            self.persist_toolbar();
        }
        self.publish(now);
    }

    /// Copy specific elements, activating the overlay for the duration of
    /// the copy feedback if it is not already active.
    ///
    /// # Returns
    /// `true` if a copy ran.
    pub fn copy_elements(&mut self, ids: &[ElementId], now: Instant) -> bool {
        if self.disposed || !self.arbitrator.is_enabled() {
            return false;
        }
        if !self.arbitrator.state().is_active() {
            let intents = self.arbitrator.activate(&mut self.scheduler);
            self.apply_intents(intents, now);
        }
        let copied = self.start_copy(ids.to_vec(), None, now);
        self.publish(now);
        copied
    }

    /// Elements the next action or copy applies to.
    pub fn current_selection(&self) -> Vec<ElementId> {
        match &self.context_menu {
            Some(menu) => menu
                .elements
                .iter()
                .copied()
                .filter(|id| self.tree.is_attached(*id))
                .collect(),
            None => self.selection.current_selection(self.tree.as_ref()),
        }
    }

    /// Run a registered action against the current selection.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `BadRequest` when the action needs a
    /// selection and there is none, or the action's own error. A failing
    /// action leaves the overlay state untouched.
    pub fn run_action(&mut self, id: &str, now: Instant) -> Result<(), GrabError> {
        let action = self.plugins.action(id).cloned().ok_or(GrabError::NotFound)?;
        let selected = self.current_selection();
        let infos = self.describe_all(&selected);
        if !action.is_available(infos.len()) {
            return Err(GrabError::BadRequest(format!("action {id} needs a selection")));
        }
        let position = self
            .context_menu
            .as_ref()
            .map(|menu| menu.position)
            .or(self.last_pointer);
        let effect = action
            .run(&ActionContext {
                elements: &infos,
                position,
            })
            .inspect_err(|err| {
                warn!(target: "pagegrab_engine::plugin", action = id, error = %err, "action failed");
            })?;
        debug!(target: "pagegrab_engine::plugin", action = id, ?effect, "action ran");
        self.context_menu = None;
        self.action_cycle.reset();
        match effect {
            ActionEffect::None => {}
            ActionEffect::Copy { extra_prompt } => {
                if !self.arbitrator.state().is_active() {
                    let intents = self.arbitrator.activate(&mut self.scheduler);
                    self.apply_intents(intents, now);
                }
                self.start_copy(selected, extra_prompt.as_deref(), now);
            }
            ActionEffect::EnterPrompt => {
                let intents = self.arbitrator.enter_prompt();
                if !intents.is_empty() {
                    self.selection.freeze(selected);
                }
                self.apply_intents(intents, now);
            }
            ActionEffect::Deactivate => {
                let intents = self
                    .arbitrator
                    .deactivate(DeactivationReason::Command, &mut self.scheduler);
                self.apply_intents(intents, now);
            }
        }
        self.publish(now);
        Ok(())
    }

    /// Close the context menu and release the selection it froze.
    pub fn dismiss_context_menu(&mut self, now: Instant) {
        if self.context_menu.take().is_some() {
            self.selection.unfreeze();
            self.arbitrator.unfreeze();
        }
        self.publish(now);
    }

    /// Step the action cycle for the current selection.
    pub(super) fn cycle_action(&mut self) {
        let count = self.current_selection().len();
        if count == 0 {
            self.action_cycle.reset();
            return;
        }
        let available = self
            .plugins
            .actions(ActionSurface::ContextMenu)
            .filter(|action| action.is_available(count))
            .map(|action| action.id.clone())
            .collect();
        self.action_cycle.advance(available);
    }

    /// Keyboard entry point for cycling (same as pressing Tab).
    pub fn next_action(&mut self, now: Instant) {
        if self.arbitrator.state().is_active() && !self.arbitrator.state().is_prompt_mode() {
            self.cycle_action();
        }
        self.publish(now);
    }

    /// Run the action the cycle currently points at.
    ///
    /// # Errors
    /// `NotFound` when no cycled action is showing, or [`Self::run_action`]'s
    /// errors.
    pub fn commit_cycled_action(&mut self, now: Instant) -> Result<(), GrabError> {
        let id = self
            .action_cycle
            .active()
            .map(str::to_string)
            .ok_or(GrabError::NotFound)?;
        self.action_cycle.reset();
        self.run_action(&id, now)
    }

    /// Hovering a label pauses its fade.
    pub fn set_label_hovered(&mut self, id: LabelId, hovered: bool, now: Instant) {
        self.selection
            .feedback
            .set_label_hovered(id, hovered, now, &mut self.scheduler);
        self.publish(now);
    }

    /// Newest first.
    pub fn history(&self) -> &[HistoryItem] {
        self.history.items()
    }

    pub fn remove_history_item(&mut self, id: &str, now: Instant) -> bool {
        let removed = self.history.remove(id);
        self.publish(now);
        removed
    }

    pub fn clear_history(&mut self, now: Instant) {
        self.history.clear();
        self.selection.feedback.clear_pinned();
        self.publish(now);
    }

    pub fn mark_history_read(&mut self, now: Instant) {
        self.history.mark_read();
        self.publish(now);
    }

    /// Outline the elements a history item was copied from with pinned
    /// boxes. Selectors that no longer resolve are skipped.
    ///
    /// # Returns
    /// The number of boxes shown.
    ///
    /// # Errors
    /// `NotFound` for an unknown history id.
    pub fn preview_history_item(&mut self, id: &str, now: Instant) -> Result<usize, GrabError> {
        let item = self.history.get(id).ok_or(GrabError::NotFound)?;
        let tree = self.tree.as_ref();
        let targets: Vec<_> = item
            .element_selectors
            .iter()
            .filter_map(|selector| tree.find_by_selector(selector))
            .filter_map(|element| bounds_of(tree, element, &self.viewport).map(|bounds| (element, bounds)))
            .collect();
        self.selection.feedback.clear_pinned();
        for (element, bounds) in &targets {
            self.selection.feedback.pin_box(*element, *bounds);
        }
        self.publish(now);
        Ok(targets.len())
    }

    pub fn clear_history_preview(&mut self, now: Instant) -> usize {
        let cleared = self.selection.feedback.clear_pinned();
        self.publish(now);
        cleared
    }

    pub fn agent_sessions(&self) -> &[AgentSession] {
        self.agents.sessions()
    }

    /// Block up to `timeout` for an agent update, then publish. Used by
    /// hosts without their own event loop.
    pub fn wait_for_agent(&mut self, timeout: std::time::Duration, now: Instant) -> bool {
        let changed = self.agents.wait_for_event(timeout);
        if changed {
            self.publish(now);
        }
        changed
    }

    /// Stop a running session and put its prompt back into the editor.
    pub fn abort_session(&mut self, id: &str, now: Instant) -> Option<RestoredInput> {
        let restored = self.agents.abort(id)?;
        self.restore_input(&restored, now);
        self.publish(now);
        Some(restored)
    }

    /// # Errors
    /// See [`crate::agent::AgentManager::undo`].
    pub fn undo_session(&mut self, id: &str, now: Instant) -> Result<RestoredInput, GrabError> {
        let restored = self.agents.undo(id)?;
        info!(target: "pagegrab_engine::agent", session_id = id, "session undone");
        self.restore_input(&restored, now);
        self.publish(now);
        Ok(restored)
    }

    /// # Errors
    /// See [`crate::agent::AgentManager::redo`].
    pub fn redo_session(&mut self, id: &str, now: Instant) -> Result<(), GrabError> {
        self.agents.redo(id)?;
        self.publish(now);
        Ok(())
    }

    /// Re-run a failed or aborted session with freshly generated content.
    ///
    /// # Errors
    /// `NotFound`, snippet errors, or [`crate::agent::AgentManager::retry`]'s
    /// errors.
    pub fn retry_session(&mut self, id: &str, now: Instant) -> Result<(), GrabError> {
        let session = self.agents.session(id).ok_or(GrabError::NotFound)?;
        let infos = session.element_infos.clone();
        let prompt = session.prompt.clone();
        let generated = self.snippets.generate(&infos, Some(&prompt))?;
        let content = self.plugins.transform_copy(generated, &infos);
        self.agents.retry(id, content)?;
        self.publish(now);
        Ok(())
    }

    /// Drop a failed session and put its prompt back into the editor.
    pub fn acknowledge_session_error(&mut self, id: &str, now: Instant) -> Option<RestoredInput> {
        let restored = self.agents.acknowledge_error(id)?;
        self.restore_input(&restored, now);
        self.publish(now);
        Some(restored)
    }

    pub fn dismiss_session(&mut self, id: &str, now: Instant) -> bool {
        let dismissed = self.agents.dismiss(id);
        self.publish(now);
        dismissed
    }

    /// Reopen the prompt on a session's elements; the next submit continues
    /// that session.
    ///
    /// # Errors
    /// `NotFound` for an unknown session or when its elements are gone,
    /// `Unsupported` when the provider cannot follow up.
    pub fn follow_up(&mut self, id: &str, now: Instant) -> Result<(), GrabError> {
        if !self.agents.capabilities().supports_follow_up {
            return Err(GrabError::Unsupported("follow-up prompts".to_string()));
        }
        let session = self.agents.session(id).ok_or(GrabError::NotFound)?;
        let restored = RestoredInput {
            session_id: session.id.clone(),
            prompt: String::new(),
            elements: session.elements.clone(),
        };
        if !self.restore_input(&restored, now) {
            return Err(GrabError::NotFound);
        }
        self.follow_up_session = Some(id.to_string());
        self.publish(now);
        Ok(())
    }

    /// # Errors
    /// `Unsupported` without a provider, or the provider's own error.
    pub fn check_agent_connection(&self) -> Result<bool, GrabError> {
        self.agents.check_connection()
    }

    /// Reopen the prompt on `restored.elements` with its text. Elements that
    /// are gone are skipped; with none left the input is only returned.
    fn restore_input(&mut self, restored: &RestoredInput, now: Instant) -> bool {
        let live: Vec<ElementId> = restored
            .elements
            .iter()
            .copied()
            .filter(|id| self.tree.is_live_target(*id))
            .collect();
        if live.is_empty() || !self.arbitrator.is_enabled() {
            debug!(target: "pagegrab_engine::agent", session_id = %restored.session_id, "restored input has no live elements");
            return false;
        }
        let state = self.arbitrator.state();
        if state.is_prompt_mode() {
            let intents = self.arbitrator.exit_prompt();
            self.apply_intents(intents, now);
        } else if !state.is_active() {
            if state.is_visible() {
                // Copy feedback still showing.
                let intents = self
                    .arbitrator
                    .deactivate(DeactivationReason::Command, &mut self.scheduler);
                self.apply_intents(intents, now);
            }
            let intents = self.arbitrator.activate(&mut self.scheduler);
            self.apply_intents(intents, now);
        }
        self.selection.freeze(live);
        self.arbitrator.freeze();
        let intents = self.arbitrator.enter_prompt();
        self.apply_intents(intents, now);
        self.prompt_input = restored.prompt.clone();
        self.arbitrator
            .set_prompt_dirty(!self.prompt_input.trim().is_empty());
        true
    }

    pub fn toolbar_state(&self) -> ToolbarState {
        self.toolbar.state()
    }

    pub fn begin_toolbar_drag(&mut self, pointer: Point, now: Instant) {
        self.toolbar.begin_drag(pointer, now);
        self.publish(now);
    }

    pub fn drag_toolbar(&mut self, pointer: Point, now: Instant) {
        self.toolbar.drag_to(pointer, now);
        self.publish(now);
    }

    /// Release the toolbar: snap to an edge and persist the placement if it
    /// changed.
    pub fn end_toolbar_drag(&mut self, now: Instant) -> ToolbarState {
        if let Some(state) = self.toolbar.end_drag(now) {
            info!(target: "pagegrab_engine::placement", edge = ?state.edge, ratio = state.ratio, "toolbar moved");
            self.persist_toolbar();
        }
        self.publish(now);
        self.toolbar.state()
    }

    pub fn set_toolbar_collapsed(&mut self, collapsed: bool, now: Instant) {
        if self.toolbar.set_collapsed(collapsed) {
            self.persist_toolbar();
        }
        self.publish(now);
    }

    /// Open a floating panel; it is placed on the next animation frame and
    /// tracked until dismissed. Opening the history panel marks it read.
    pub fn open_panel(&mut self, kind: PanelKind, size: Size, now: Instant) {
        self.anchors.open(kind, size);
        if kind == PanelKind::History {
            self.history.mark_read();
        }
        self.publish(now);
    }

    pub fn dismiss_panel(&mut self, kind: PanelKind, now: Instant) -> bool {
        let dismissed = self.anchors.dismiss(kind);
        if kind == PanelKind::History {
            self.selection.feedback.clear_pinned();
        }
        self.publish(now);
        dismissed
    }
}
