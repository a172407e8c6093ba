//! Copy execution and prompt (comment / agent) submission.

use super::EngineRuntime;
use crate::activation::DeactivationReason;
use crate::agent::protocol::StartRequest;
use crate::copy::perform_copy;
use pagegrab_core::geometry::{bounds_of, selection_bounds};
use pagegrab_core::{ElementId, GrabError, HistoryItem, OverlayBounds, Point, Rect};
use std::time::Instant;
use tracing::{info, warn};

impl EngineRuntime {
    /// Run one copy of `ids`.
    ///
    /// A refused copy (not active, or a copy already in flight) does
    /// nothing. Otherwise detached or ineligible ids are dropped; with nothing
    /// left the overlay deactivates instead of copying.
    ///
    /// # Returns
    /// `true` if a copy ran (successfully or not).
    pub(super) fn start_copy(&mut self, ids: Vec<ElementId>, extra_prompt: Option<&str>, now: Instant) -> bool {
        if !self.arbitrator.can_begin_copy() {
            warn!(target: "pagegrab_engine::copy", state = self.arbitrator.state().name(), "copy refused");
            return false;
        }
        let tree = self.tree.as_ref();
        let infos: Vec<_> = ids
            .iter()
            .filter(|id| tree.is_live_target(**id))
            .filter_map(|id| tree.describe(*id))
            .collect();
        let Some(primary) = infos.first().cloned() else {
            warn!(target: "pagegrab_engine::copy", requested = ids.len(), "copy has no live target");
            let intents = self
                .arbitrator
                .deactivate(DeactivationReason::NoTarget, &mut self.scheduler);
            self.apply_intents(intents, now);
            return false;
        };
        if !self.arbitrator.begin_copy() {
            return false;
        }
        let live: Vec<ElementId> = infos.iter().map(|info| info.id).collect();
        self.context_menu = None;
        self.action_cycle.reset();

        let bounds = selection_bounds(tree, &live, &self.viewport)
            .unwrap_or_else(|| OverlayBounds::from_rect(Rect::default()));
        let label = self.selection.feedback.start_copy_label(
            bounds,
            &primary,
            &live,
            now,
            &mut self.scheduler,
        );
        for id in &live {
            if let Some(element_bounds) = bounds_of(tree, *id, &self.viewport) {
                self.selection
                    .feedback
                    .add_grabbed_box(*id, element_bounds, now, &mut self.scheduler);
            }
        }

        self.plugins.notify_before_copy(&infos);
        let result = perform_copy(
            &self.plugins,
            self.snippets.as_ref(),
            self.clipboard.as_mut(),
            &infos,
            extra_prompt,
        );
        match result {
            Ok(outcome) => {
                let item = HistoryItem::new(
                    outcome.content.clone(),
                    &infos,
                    extra_prompt.map(str::to_string),
                );
                self.history.record(item, now, &mut self.scheduler);
                self.selection
                    .feedback
                    .settle_label(label, Ok(()), now, &mut self.scheduler);
                self.plugins.notify_copy_success(&outcome.content, &infos);
                self.plugins.notify_after_copy(&infos, true);
            }
            Err(err) => {
                let message = err.to_string();
                warn!(target: "pagegrab_engine::copy", error = %message, "copy failed");
                self.selection
                    .feedback
                    .settle_label(label, Err(message.clone()), now, &mut self.scheduler);
                self.plugins.notify_copy_error(&message);
                self.plugins.notify_after_copy(&infos, false);
            }
        }
        self.arbitrator.finish_copy(now, &mut self.scheduler);
        true
    }

    /// Open the prompt for the current selection.
    ///
    /// # Returns
    /// `false` when nothing is selected or the overlay cannot enter prompt
    /// mode from its current state.
    pub fn enter_prompt_mode(&mut self, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let selected = self.selection.current_selection(self.tree.as_ref());
        if selected.is_empty() {
            return false;
        }
        let intents = self.arbitrator.enter_prompt();
        if intents.is_empty() {
            return false;
        }
        self.selection.freeze(selected);
        self.context_menu = None;
        self.action_cycle.reset();
        self.apply_intents(intents, now);
        self.publish(now);
        true
    }

    /// Replace the prompt text. Typing clears a pending dismissal.
    pub fn set_prompt_input(&mut self, text: impl Into<String>, now: Instant) {
        if !self.arbitrator.state().is_prompt_mode() {
            return;
        }
        self.prompt_input = text.into();
        self.arbitrator
            .set_prompt_dirty(!self.prompt_input.trim().is_empty());
        self.publish(now);
    }

    /// Cancel the prompt. With unsaved text the first call only arms the
    /// dismissal; the second closes it.
    pub fn cancel_prompt(&mut self, now: Instant) {
        let intents = self.arbitrator.cancel_prompt(&mut self.scheduler);
        self.apply_intents(intents, now);
        self.publish(now);
    }

    /// Keep editing after a cancel armed the dismissal.
    pub fn resume_prompt(&mut self, now: Instant) {
        self.arbitrator.resume_prompt();
        self.publish(now);
    }

    /// Submit the prompt.
    ///
    /// With an agent provider the prompt starts (or continues) a session and
    /// the overlay closes. Without one the selection is copied with the
    /// prompt as a comment.
    ///
    /// # Returns
    /// The session id when an agent run started.
    ///
    /// # Errors
    /// `BadRequest` outside prompt mode or for a blank agent prompt,
    /// `NotFound` when the frozen elements are gone, snippet errors, and
    /// agent start errors. The overlay stays in prompt mode on error.
    pub fn submit_prompt(&mut self, now: Instant) -> Result<Option<String>, GrabError> {
        if !self.arbitrator.state().is_prompt_mode() {
            return Err(GrabError::BadRequest("not in prompt mode".to_string()));
        }
        let prompt = self.prompt_input.trim().to_string();
        let selected = self.selection.frozen(self.tree.as_ref());
        let infos = self.describe_all(&selected);
        if infos.is_empty() {
            return Err(GrabError::NotFound);
        }

        if self.agents.has_provider() {
            if prompt.is_empty() {
                return Err(GrabError::BadRequest("prompt is empty".to_string()));
            }
            let generated = self.snippets.generate(&infos, Some(&prompt))?;
            let content = self.plugins.transform_copy(generated, &infos);
            let position = self.prompt_anchor();
            let session_id = self.agents.start(StartRequest {
                prompt,
                elements: infos,
                content,
                position,
                session_id: self.follow_up_session.clone(),
            })?;
            info!(target: "pagegrab_engine::agent", session_id = %session_id, "prompt submitted to agent");
            let intents = self
                .arbitrator
                .deactivate(DeactivationReason::PromptSubmitted, &mut self.scheduler);
            self.apply_intents(intents, now);
            self.publish(now);
            return Ok(Some(session_id));
        }

        let intents = self.arbitrator.exit_prompt();
        self.apply_intents(intents, now);
        self.prompt_input.clear();
        let comment = (!prompt.is_empty()).then_some(prompt);
        self.start_copy(selected, comment.as_deref(), now);
        self.publish(now);
        Ok(None)
    }

    /// Viewport point a session label is anchored to: the bottom center of
    /// the selection.
    fn prompt_anchor(&mut self) -> Point {
        self.selection
            .selection_bounds(self.tree.as_ref(), &self.viewport, self.viewport_version)
            .map(|bounds| Point::new(bounds.x + bounds.width / 2.0, bounds.y + bounds.height))
            .or(self.last_pointer)
            .unwrap_or_default()
    }
}
