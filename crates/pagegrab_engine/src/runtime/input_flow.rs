//! Host input and the intents it produces.

use super::{ContextMenuState, EngineRuntime};
use crate::activation::{DeactivationReason, Intent};
use crate::input::InputEvent;
use crate::selection::HitTestTicket;
use crate::timers::TimerKind;
use pagegrab_core::geometry::point_on_element;
use pagegrab_core::{ElementId, Point};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::debug;

impl EngineRuntime {
    /// Feed one host event.
    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        if self.disposed {
            return;
        }
        let intents = match event {
            InputEvent::KeyDown(key) => self.arbitrator.key_down(&key, now, &mut self.scheduler),
            InputEvent::KeyUp(key) => self.arbitrator.key_up(&key, &mut self.scheduler),
            InputEvent::PointerMove(pointer) => {
                self.last_pointer = Some(pointer.position);
                self.arbitrator.pointer_move(&pointer)
            }
            InputEvent::PointerDown(pointer) => {
                self.last_pointer = Some(pointer.position);
                if self.context_menu.take().is_some() {
                    self.selection.unfreeze();
                }
                self.arbitrator.pointer_down(&pointer)
            }
            InputEvent::PointerUp(pointer) => {
                self.last_pointer = Some(pointer.position);
                self.arbitrator.pointer_up(&pointer)
            }
            InputEvent::Click(pointer) => self.arbitrator.click(&pointer),
            InputEvent::ContextMenu(pointer) => {
                self.last_pointer = Some(pointer.position);
                self.arbitrator.context_menu(&pointer)
            }
            InputEvent::HostCopy => {
                self.arbitrator.host_copy();
                Vec::new()
            }
            InputEvent::WindowBlur => self.arbitrator.window_blur(&mut self.scheduler),
            InputEvent::VisibilityChange { hidden } => {
                self.arbitrator
                    .visibility_changed(hidden, now, &mut self.scheduler)
            }
            InputEvent::Scroll { scroll_x, scroll_y } => {
                self.viewport.scroll_x = scroll_x;
                self.viewport.scroll_y = scroll_y;
                self.viewport_changed();
                Vec::new()
            }
            InputEvent::Resize { width, height } => {
                self.viewport.width = width.max(0.0);
                self.viewport.height = height.max(0.0);
                self.toolbar.resize(self.viewport.size());
                self.viewport_changed();
                Vec::new()
            }
        };
        self.apply_intents(intents, now);
        self.publish(now);
    }

    fn viewport_changed(&mut self) {
        self.viewport_version = self.viewport_version.wrapping_add(1);
        self.selection
            .feedback
            .refresh_bounds(self.tree.as_ref(), &self.viewport);
    }

    /// Perform the side effects of a batch of transitions. Handling one
    /// intent may transition again; those intents are queued behind it.
    pub(super) fn apply_intents(&mut self, intents: Vec<Intent>, now: Instant) {
        let mut queue: VecDeque<Intent> = intents.into();
        while let Some(intent) = queue.pop_front() {
            debug!(target: "pagegrab_engine::runtime", ?intent, "applying intent");
            let follow_up = self.apply_intent(intent, now);
            queue.extend(follow_up);
        }
    }

    fn apply_intent(&mut self, intent: Intent, now: Instant) -> Vec<Intent> {
        match intent {
            Intent::Activated => {
                self.plugins.notify_activate();
                self.selection.reset();
                self.action_cycle.reset();
                if let Some(pointer) = self.last_pointer {
                    let ticket = self
                        .selection
                        .hit_test_now(self.viewport.viewport_to_page(pointer), now);
                    self.run_hit_test(ticket, now);
                }
                Vec::new()
            }
            Intent::Deactivated(reason) => {
                self.on_deactivated(reason);
                Vec::new()
            }
            Intent::Hover(point) => {
                self.hover_at(point, now);
                Vec::new()
            }
            Intent::DragStarted { origin, current } => {
                let page_origin = self.viewport.viewport_to_page(origin);
                let page_current = self.viewport.viewport_to_page(current);
                self.selection.begin_drag(page_origin, page_current);
                self.scheduler.cancel_kind(TimerKind::HitTestTrailing);
                self.action_cycle.reset();
                self.lookup.clear();
                self.plugins.notify_drag_start(origin);
                self.scheduler.restart(
                    TimerKind::DragPreview,
                    now,
                    self.config.drag_preview_debounce(),
                );
                Vec::new()
            }
            Intent::DragMoved { current, .. } => {
                self.selection
                    .update_drag(self.viewport.viewport_to_page(current));
                self.scheduler.restart(
                    TimerKind::DragPreview,
                    now,
                    self.config.drag_preview_debounce(),
                );
                Vec::new()
            }
            Intent::DragCommitted { end, .. } => {
                self.scheduler.cancel_kind(TimerKind::DragPreview);
                let selected = self
                    .selection
                    .commit_drag(self.tree.as_ref(), self.viewport.viewport_to_page(end));
                let infos = self.describe_all(&selected);
                self.plugins.notify_drag_end(&infos);
                if !selected.is_empty() {
                    self.start_copy(selected, None, now);
                }
                self.arbitrator.release_if_unheld(&mut self.scheduler)
            }
            Intent::Select(point) => {
                self.selection.unfreeze();
                let ticket = self
                    .selection
                    .hit_test_now(self.viewport.viewport_to_page(point), now);
                self.run_hit_test(ticket, now);
                match self.selection.hovered(self.tree.as_ref()) {
                    Some(target) => {
                        self.start_copy(vec![target], None, now);
                        self.arbitrator.release_if_unheld(&mut self.scheduler)
                    }
                    None => {
                        debug!(target: "pagegrab_engine::runtime", "click with no target");
                        self.arbitrator
                            .deactivate(DeactivationReason::NoTarget, &mut self.scheduler)
                    }
                }
            }
            Intent::CommitSelection => {
                if self.action_cycle.is_visible {
                    if let Err(err) = self.commit_cycled_action(now) {
                        debug!(target: "pagegrab_engine::runtime", error = %err, "cycled action failed");
                    }
                    return Vec::new();
                }
                let selected = self.selection.current_selection(self.tree.as_ref());
                if !selected.is_empty() {
                    self.start_copy(selected, None, now);
                }
                Vec::new()
            }
            Intent::ContextMenu(point) => {
                self.open_context_menu(point, now);
                Vec::new()
            }
            Intent::Navigate(direction) => {
                if let Some(next) = self.selection.navigate(self.tree.as_ref(), direction) {
                    self.arbitrator.freeze();
                    self.target_changed(Some(next));
                }
                Vec::new()
            }
            Intent::CycleAction => {
                self.cycle_action();
                Vec::new()
            }
            Intent::Resumed => {
                self.selection.unfreeze();
                self.selection.cancel_drag();
                self.context_menu = None;
                if let Some(pointer) = self.last_pointer {
                    let ticket = self
                        .selection
                        .hit_test_now(self.viewport.viewport_to_page(pointer), now);
                    self.run_hit_test(ticket, now);
                }
                Vec::new()
            }
            Intent::PromptModeChanged(is_prompt_mode) => {
                self.plugins.notify_prompt_mode(is_prompt_mode);
                Vec::new()
            }
            Intent::PendingDismiss => Vec::new(),
        }
    }

    fn on_deactivated(&mut self, reason: DeactivationReason) {
        self.plugins.notify_deactivate();
        self.selection.reset();
        self.scheduler.cancel_kind(TimerKind::DragPreview);
        self.scheduler.cancel_kind(TimerKind::HitTestTrailing);
        if reason.clears_feedback() {
            self.selection.feedback.clear_all(&mut self.scheduler);
        }
        self.prompt_input.clear();
        self.follow_up_session = None;
        self.action_cycle.reset();
        self.context_menu = None;
        self.lookup.clear();
    }

    /// Throttled hover hit test at a viewport point. Inside the throttle
    /// window the point is kept and tested when the window closes.
    fn hover_at(&mut self, point: Point, now: Instant) {
        let throttle = self.config.hit_test_throttle();
        let page = self.viewport.viewport_to_page(point);
        match self.selection.pointer_moved(page, now, throttle) {
            Some(ticket) => {
                self.scheduler.cancel_kind(TimerKind::HitTestTrailing);
                self.run_hit_test(ticket, now);
            }
            None => {
                if !self.scheduler.is_scheduled(TimerKind::HitTestTrailing) {
                    self.scheduler
                        .schedule(TimerKind::HitTestTrailing, now, throttle);
                }
            }
        }
    }

    pub(super) fn run_hit_test(&mut self, ticket: HitTestTicket, now: Instant) {
        let tree = self.tree.as_ref();
        let result = point_on_element(tree, ticket.point, &|id| tree.is_eligible(id));
        self.apply_hit_result(ticket, result, now);
    }

    /// Land a hit-test answer. Answers for a superseded or stale ticket are
    /// dropped without touching the target.
    pub(super) fn apply_hit_result(&mut self, ticket: HitTestTicket, result: Option<ElementId>, now: Instant) {
        let stale_after = self.config.hit_test_stale();
        if self.selection.apply_hit_test(ticket, result, now, stale_after) {
            let hovered = self.selection.hovered(self.tree.as_ref());
            self.target_changed(hovered);
        }
    }

    /// The element the overlay points at changed: tell plugins, reset the
    /// action cycle and start resolving the new target.
    fn target_changed(&mut self, target: Option<ElementId>) {
        let info = target.and_then(|id| self.tree.describe(id));
        self.plugins.notify_hover(info.as_ref());
        self.action_cycle.reset();
        match info {
            Some(info) => self.lookup.request(info),
            None => self.lookup.clear(),
        }
    }

    /// Freeze what the menu applies to: an existing multi-selection when the
    /// pointer is on one of its members, else the element under the pointer.
    fn open_context_menu(&mut self, point: Point, now: Instant) {
        let ticket = self
            .selection
            .hit_test_now(self.viewport.viewport_to_page(point), now);
        self.run_hit_test(ticket, now);
        let tree = self.tree.as_ref();
        let frozen = self.selection.frozen(tree);
        let target = self.selection.hovered(tree);
        let elements = match target {
            Some(target) if frozen.len() > 1 && frozen.contains(&target) => frozen,
            Some(target) => vec![target],
            None => {
                self.arbitrator.unfreeze();
                self.context_menu = None;
                return;
            }
        };
        self.selection.freeze(elements.clone());
        self.action_cycle.reset();
        self.context_menu = Some(ContextMenuState {
            position: point,
            elements,
        });
    }
}
