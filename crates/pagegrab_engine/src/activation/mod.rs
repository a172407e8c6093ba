//! Activation arbitration.
//!
//! [`Arbitrator`] owns the single [`ActivationState`] value and is the only
//! place it changes. Raw key/pointer input and imperative commands both go
//! through here; the runtime acts on the returned [`Intent`]s.

use crate::input::{Key, KeyEvent, PointerButton, PointerEvent};
use crate::timers::{Scheduler, TimerKind};
use pagegrab_core::{ActivationMode, Config, Point};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sub-phase of the active overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePhase {
    /// Following the pointer.
    Normal,
    /// Selection pinned (context menu, keyboard navigation, prompt).
    Frozen,
    /// Primary button held; a marquee may be forming.
    Dragging,
    /// A drag just ended; the host's trailing click is swallowed.
    JustDragged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    Holding {
        started_at: Instant,
        required_hold: Duration,
    },
    Active {
        phase: ActivePhase,
        is_prompt_mode: bool,
        is_pending_dismiss: bool,
    },
    Copying,
    JustCopied,
}

impl ActivationState {
    const fn active(phase: ActivePhase) -> Self {
        Self::Active {
            phase,
            is_prompt_mode: false,
            is_pending_dismiss: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Holding { .. } => "holding",
            Self::Active { .. } => "active",
            Self::Copying => "copying",
            Self::JustCopied => "just_copied",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_holding(&self) -> bool {
        matches!(self, Self::Holding { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn phase(&self) -> Option<ActivePhase> {
        match self {
            Self::Active { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.phase() == Some(ActivePhase::Dragging)
    }

    pub fn is_copying(&self) -> bool {
        matches!(self, Self::Copying)
    }

    pub fn is_prompt_mode(&self) -> bool {
        matches!(
            self,
            Self::Active {
                is_prompt_mode: true,
                ..
            }
        )
    }

    pub fn is_pending_dismiss(&self) -> bool {
        matches!(
            self,
            Self::Active {
                is_pending_dismiss: true,
                ..
            }
        )
    }

    /// The overlay is showing feedback (active, copying or confirming a copy).
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Active { .. } | Self::Copying | Self::JustCopied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationReason {
    Released,
    Toggled,
    Escape,
    Blur,
    HiddenTab,
    StuckKey,
    Command,
    Disabled,
    CopyFinished,
    PromptDismissed,
    PromptSubmitted,
    NoTarget,
    Disposed,
}

impl DeactivationReason {
    /// Whether transient feedback (labels, grabbed boxes) goes away with the
    /// overlay. After a copy or submit the labels are left to fade.
    pub fn clears_feedback(self) -> bool {
        matches!(
            self,
            Self::Escape | Self::Blur | Self::HiddenTab | Self::StuckKey | Self::Disabled | Self::Disposed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Side effects the runtime performs after a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Activated,
    Deactivated(DeactivationReason),
    /// Pointer moved while following (viewport coordinates).
    Hover(Point),
    DragStarted { origin: Point, current: Point },
    DragMoved { origin: Point, current: Point },
    DragCommitted { origin: Point, end: Point },
    /// Click (or under-threshold drag) on a point: copy what is under it.
    Select(Point),
    /// Enter pressed with a selection.
    CommitSelection,
    ContextMenu(Point),
    Navigate(Direction),
    CycleAction,
    /// Returned to following after the copy feedback window.
    Resumed,
    PromptModeChanged(bool),
    PendingDismiss,
}

/// Single owner of the activation state machine.
#[derive(Debug)]
pub struct Arbitrator {
    state: ActivationState,
    config: Config,
    enabled: bool,
    /// Activated by a toggle (imperative call or toggle mode) rather than a held combo.
    activated_by_toggle: bool,
    combo_held: bool,
    /// The host copy event fired during the current hold.
    awaiting_copy_confirmation: bool,
    drag_origin: Option<Point>,
    drag_exceeded: bool,
    prompt_dirty: bool,
    revision: u64,
}

impl Arbitrator {
    pub fn new(config: &Config) -> Self {
        Self {
            state: ActivationState::Idle,
            config: config.clone(),
            enabled: true,
            activated_by_toggle: false,
            combo_held: false,
            awaiting_copy_confirmation: false,
            drag_origin: None,
            drag_exceeded: false,
            prompt_dirty: false,
            revision: 0,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Bumped on every transition; cheap change detection for snapshots.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn activated_by_toggle(&self) -> bool {
        self.activated_by_toggle
    }

    pub fn is_combo_held(&self) -> bool {
        self.combo_held
    }

    pub fn is_awaiting_copy_confirmation(&self) -> bool {
        self.awaiting_copy_confirmation
    }

    /// Viewport-space drag origin while a drag is forming.
    pub fn drag_origin(&self) -> Option<Point> {
        self.drag_origin
    }

    fn set_state(&mut self, next: ActivationState) {
        if self.state != next {
            debug!(
                target: "pagegrab_engine::activation",
                from = self.state.name(),
                to = next.name(),
                "activation transition"
            );
            self.state = next;
            self.revision = self.revision.wrapping_add(1);
        }
    }

    fn set_phase(&mut self, phase: ActivePhase) {
        if let ActivationState::Active {
            is_prompt_mode,
            is_pending_dismiss,
            ..
        } = self.state
        {
            self.set_state(ActivationState::Active {
                phase,
                is_prompt_mode,
                is_pending_dismiss,
            });
        }
    }

    fn is_combo(&self, event: &KeyEvent) -> bool {
        event.key.matches_char(self.config.activation_key) && event.modifiers.command()
    }

    fn is_combo_release(&self, event: &KeyEvent) -> bool {
        event.key.matches_char(self.config.activation_key) || event.key.is_command_modifier()
    }

    fn start_hold(&mut self, event: &KeyEvent, now: Instant, scheduler: &mut Scheduler) {
        let required_hold = if event.in_text_input || event.has_text_selection {
            self.config.extended_hold_duration()
        } else {
            self.config.hold_duration()
        };
        scheduler.restart(TimerKind::Hold, now, required_hold);
        self.set_state(ActivationState::Holding {
            started_at: now,
            required_hold,
        });
    }

    fn enter_active(&mut self, by_toggle: bool, scheduler: &mut Scheduler) -> Vec<Intent> {
        scheduler.cancel_kind(TimerKind::Hold);
        scheduler.cancel_kind(TimerKind::HiddenTabGrace);
        self.awaiting_copy_confirmation = false;
        self.activated_by_toggle = by_toggle;
        self.drag_origin = None;
        self.drag_exceeded = false;
        self.prompt_dirty = false;
        self.set_state(ActivationState::active(ActivePhase::Normal));
        vec![Intent::Activated]
    }

    /// Return to Idle, cancelling every activation-owned timer.
    ///
    /// Leaving a state that never activated (Idle, Holding) emits no
    /// [`Intent::Deactivated`].
    pub fn deactivate(&mut self, reason: DeactivationReason, scheduler: &mut Scheduler) -> Vec<Intent> {
        for kind in [
            TimerKind::Hold,
            TimerKind::SpamGuard,
            TimerKind::HiddenTabGrace,
            TimerKind::CopiedFeedback,
        ] {
            scheduler.cancel_kind(kind);
        }
        let was_visible = self.state.is_visible();
        let was_prompt = self.state.is_prompt_mode();
        self.awaiting_copy_confirmation = false;
        self.activated_by_toggle = false;
        self.drag_origin = None;
        self.drag_exceeded = false;
        self.prompt_dirty = false;
        self.set_state(ActivationState::Idle);

        let mut intents = Vec::new();
        if was_prompt {
            intents.push(Intent::PromptModeChanged(false));
        }
        if was_visible {
            intents.push(Intent::Deactivated(reason));
        }
        intents
    }

    /// Imperative activation. A no-op when already visible.
    pub fn activate(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !self.enabled || self.state.is_visible() {
            return Vec::new();
        }
        self.enter_active(true, scheduler)
    }

    pub fn toggle(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if self.state.is_visible() {
            self.deactivate(DeactivationReason::Toggled, scheduler)
        } else {
            self.activate(scheduler)
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, scheduler: &mut Scheduler) -> Vec<Intent> {
        if self.enabled == enabled {
            return Vec::new();
        }
        self.enabled = enabled;
        self.revision = self.revision.wrapping_add(1);
        if enabled {
            Vec::new()
        } else {
            self.combo_held = false;
            self.deactivate(DeactivationReason::Disabled, scheduler)
        }
    }

    pub fn key_down(&mut self, event: &KeyEvent, now: Instant, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !self.enabled {
            return Vec::new();
        }
        if event.key == Key::Escape {
            return self.escape(scheduler);
        }
        if self.is_combo(event) {
            return self.combo_down(event, now, scheduler);
        }

        let ActivationState::Active {
            phase,
            is_prompt_mode: false,
            ..
        } = self.state
        else {
            return Vec::new();
        };
        if phase == ActivePhase::Dragging {
            return Vec::new();
        }
        let direction = match event.key {
            Key::ArrowUp => Some(Direction::Up),
            Key::ArrowDown => Some(Direction::Down),
            Key::ArrowLeft => Some(Direction::Left),
            Key::ArrowRight => Some(Direction::Right),
            _ => None,
        };
        match (event.key, direction) {
            (_, Some(direction)) => vec![Intent::Navigate(direction)],
            (Key::Enter, _) => vec![Intent::CommitSelection],
            (Key::Tab, _) => vec![Intent::CycleAction],
            _ => Vec::new(),
        }
    }

    fn combo_down(&mut self, event: &KeyEvent, now: Instant, scheduler: &mut Scheduler) -> Vec<Intent> {
        match self.state {
            ActivationState::Idle => {
                if event.repeat {
                    // Keys still held after a forced deactivation.
                    return Vec::new();
                }
                self.combo_held = true;
                self.awaiting_copy_confirmation = false;
                self.start_hold(event, now, scheduler);
                Vec::new()
            }
            ActivationState::Holding { .. } => {
                self.combo_held = true;
                if !event.repeat && !self.awaiting_copy_confirmation {
                    self.start_hold(event, now, scheduler);
                }
                // A re-press while the host copy is unconfirmed is deferred:
                // the running hold timer or the next release decides.
                Vec::new()
            }
            ActivationState::Active { .. } => {
                if event.repeat {
                    if !self.activated_by_toggle {
                        scheduler.restart(TimerKind::SpamGuard, now, self.config.keydown_spam_silence());
                    }
                    return Vec::new();
                }
                if self.activated_by_toggle && !self.state.is_prompt_mode() {
                    self.combo_held = true;
                    return self.deactivate(DeactivationReason::Toggled, scheduler);
                }
                self.combo_held = true;
                Vec::new()
            }
            ActivationState::Copying | ActivationState::JustCopied => {
                self.combo_held = true;
                Vec::new()
            }
        }
    }

    pub fn key_up(&mut self, event: &KeyEvent, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !self.is_combo_release(event) {
            return Vec::new();
        }
        self.combo_held = false;
        match self.state {
            // Lifting only the letter keeps an unconfirmed hold alive so the
            // re-press stays deferred; the modifier release decides.
            ActivationState::Holding { .. }
                if self.awaiting_copy_confirmation
                    && !event.key.is_command_modifier()
                    && event.modifiers.command() =>
            {
                Vec::new()
            }
            ActivationState::Holding { .. } => {
                scheduler.cancel_kind(TimerKind::Hold);
                self.awaiting_copy_confirmation = false;
                self.set_state(ActivationState::Idle);
                Vec::new()
            }
            ActivationState::Active {
                phase,
                is_prompt_mode,
                ..
            } => {
                scheduler.cancel_kind(TimerKind::SpamGuard);
                if self.activated_by_toggle || is_prompt_mode || phase == ActivePhase::Dragging {
                    return Vec::new();
                }
                self.deactivate(DeactivationReason::Released, scheduler)
            }
            _ => Vec::new(),
        }
    }

    /// The host fired its own copy event.
    pub fn host_copy(&mut self) {
        if self.state.is_holding() {
            self.awaiting_copy_confirmation = true;
        }
    }

    pub fn on_hold_elapsed(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !self.state.is_holding() || !self.enabled {
            return Vec::new();
        }
        let by_toggle = self.config.activation_mode == ActivationMode::Toggle;
        self.enter_active(by_toggle, scheduler)
    }

    /// Repeat keydowns went silent: the release was missed.
    pub fn on_spam_silence(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !self.state.is_active() || self.activated_by_toggle || self.state.is_prompt_mode() {
            return Vec::new();
        }
        self.combo_held = false;
        self.deactivate(DeactivationReason::StuckKey, scheduler)
    }

    pub fn escape(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if self.state.is_prompt_mode() {
            return self.cancel_prompt(scheduler);
        }
        if self.state.is_holding() {
            scheduler.cancel_kind(TimerKind::Hold);
            self.set_state(ActivationState::Idle);
            return Vec::new();
        }
        self.deactivate(DeactivationReason::Escape, scheduler)
    }

    pub fn window_blur(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        self.combo_held = false;
        if self.state.is_prompt_mode() {
            return Vec::new();
        }
        if self.state.is_holding() {
            scheduler.cancel_kind(TimerKind::Hold);
            self.awaiting_copy_confirmation = false;
            self.set_state(ActivationState::Idle);
            return Vec::new();
        }
        self.deactivate(DeactivationReason::Blur, scheduler)
    }

    pub fn visibility_changed(&mut self, hidden: bool, now: Instant, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !hidden {
            scheduler.cancel_kind(TimerKind::HiddenTabGrace);
            return Vec::new();
        }
        if !self.state.is_idle() {
            scheduler.restart(TimerKind::HiddenTabGrace, now, self.config.hidden_tab_grace());
        }
        Vec::new()
    }

    pub fn on_hidden_grace_elapsed(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if self.state.is_prompt_mode() {
            return Vec::new();
        }
        self.combo_held = false;
        if self.state.is_holding() {
            scheduler.cancel_kind(TimerKind::Hold);
            self.set_state(ActivationState::Idle);
            return Vec::new();
        }
        self.deactivate(DeactivationReason::HiddenTab, scheduler)
    }

    pub fn pointer_down(&mut self, event: &PointerEvent) -> Vec<Intent> {
        if event.button != PointerButton::Primary {
            return Vec::new();
        }
        match self.state {
            ActivationState::Active {
                phase: ActivePhase::Normal | ActivePhase::JustDragged | ActivePhase::Frozen,
                is_prompt_mode: false,
                ..
            } => {
                self.drag_origin = Some(event.position);
                self.drag_exceeded = false;
                self.set_phase(ActivePhase::Dragging);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> Vec<Intent> {
        match self.state {
            ActivationState::Active {
                phase: ActivePhase::Dragging,
                ..
            } => {
                let Some(origin) = self.drag_origin else {
                    return Vec::new();
                };
                let current = event.position;
                if self.drag_exceeded {
                    return vec![Intent::DragMoved { origin, current }];
                }
                if origin.distance(current) > self.config.drag_threshold_px {
                    self.drag_exceeded = true;
                    return vec![Intent::DragStarted { origin, current }];
                }
                Vec::new()
            }
            ActivationState::Active {
                phase: ActivePhase::JustDragged,
                ..
            } => {
                self.set_phase(ActivePhase::Normal);
                vec![Intent::Hover(event.position)]
            }
            ActivationState::Active {
                phase: ActivePhase::Normal,
                ..
            } => vec![Intent::Hover(event.position)],
            _ => Vec::new(),
        }
    }

    pub fn pointer_up(&mut self, event: &PointerEvent) -> Vec<Intent> {
        if event.button != PointerButton::Primary || !self.state.is_dragging() {
            return Vec::new();
        }
        let origin = self.drag_origin.take().unwrap_or(event.position);
        if std::mem::take(&mut self.drag_exceeded) {
            self.set_phase(ActivePhase::JustDragged);
            vec![Intent::DragCommitted {
                origin,
                end: event.position,
            }]
        } else {
            self.set_phase(ActivePhase::Normal);
            vec![Intent::Select(event.position)]
        }
    }

    /// A hold-mode combo released mid-drag deactivates once the drag ends
    /// without starting a copy.
    pub fn release_if_unheld(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        let ActivationState::Active {
            phase: ActivePhase::Normal | ActivePhase::JustDragged,
            is_prompt_mode: false,
            ..
        } = self.state
        else {
            return Vec::new();
        };
        if self.activated_by_toggle || self.combo_held {
            return Vec::new();
        }
        self.deactivate(DeactivationReason::Released, scheduler)
    }

    /// The host click that trails every pointer-up. Only meaningful right
    /// after a drag, where it is swallowed.
    pub fn click(&mut self, _event: &PointerEvent) -> Vec<Intent> {
        if self.state.phase() == Some(ActivePhase::JustDragged) {
            self.set_phase(ActivePhase::Normal);
        }
        Vec::new()
    }

    pub fn context_menu(&mut self, event: &PointerEvent) -> Vec<Intent> {
        match self.state {
            ActivationState::Active {
                phase: ActivePhase::Normal | ActivePhase::Frozen | ActivePhase::JustDragged,
                is_prompt_mode: false,
                ..
            } => {
                self.set_phase(ActivePhase::Frozen);
                vec![Intent::ContextMenu(event.position)]
            }
            _ => Vec::new(),
        }
    }

    pub fn freeze(&mut self) {
        if matches!(
            self.state.phase(),
            Some(ActivePhase::Normal | ActivePhase::JustDragged)
        ) {
            self.set_phase(ActivePhase::Frozen);
        }
    }

    pub fn unfreeze(&mut self) {
        if self.state.phase() == Some(ActivePhase::Frozen) && !self.state.is_prompt_mode() {
            self.set_phase(ActivePhase::Normal);
        }
    }

    pub fn can_begin_copy(&self) -> bool {
        self.state.is_active()
    }

    /// Copy may only start from the active overlay; re-entry while a copy
    /// is in flight is refused.
    pub fn begin_copy(&mut self) -> bool {
        if !self.can_begin_copy() {
            return false;
        }
        self.drag_origin = None;
        self.drag_exceeded = false;
        self.prompt_dirty = false;
        self.set_state(ActivationState::Copying);
        true
    }

    pub fn finish_copy(&mut self, now: Instant, scheduler: &mut Scheduler) {
        if self.state.is_copying() {
            scheduler.restart(TimerKind::CopiedFeedback, now, self.config.copied_feedback());
            self.set_state(ActivationState::JustCopied);
        }
    }

    /// End of the "copied" feedback window.
    ///
    /// A one-shot toggle returns to Idle; a held combo or
    /// `keep_active_after_copy` returns to following.
    pub fn on_copied_feedback_elapsed(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        if !matches!(self.state, ActivationState::JustCopied) {
            return Vec::new();
        }
        let stay_active = if self.activated_by_toggle {
            self.config.keep_active_after_copy
        } else {
            self.combo_held
        };
        if stay_active && self.enabled {
            self.set_state(ActivationState::active(ActivePhase::Normal));
            vec![Intent::Resumed]
        } else {
            self.deactivate(DeactivationReason::CopyFinished, scheduler)
        }
    }

    pub fn enter_prompt(&mut self) -> Vec<Intent> {
        match self.state {
            ActivationState::Active {
                phase: ActivePhase::Normal | ActivePhase::Frozen | ActivePhase::JustDragged,
                is_prompt_mode: false,
                ..
            } => {
                self.prompt_dirty = false;
                self.drag_origin = None;
                self.set_state(ActivationState::Active {
                    phase: ActivePhase::Frozen,
                    is_prompt_mode: true,
                    is_pending_dismiss: false,
                });
                vec![Intent::PromptModeChanged(true)]
            }
            _ => Vec::new(),
        }
    }

    /// Track whether the prompt holds unsaved text. Typing clears a pending
    /// dismissal.
    pub fn set_prompt_dirty(&mut self, dirty: bool) {
        self.prompt_dirty = dirty;
        if self.state.is_pending_dismiss() {
            self.resume_prompt();
        }
    }

    /// First cancel with unsaved input only arms the dismissal; a second
    /// cancel (or a cancel with nothing typed) closes the prompt.
    pub fn cancel_prompt(&mut self, scheduler: &mut Scheduler) -> Vec<Intent> {
        let ActivationState::Active {
            is_prompt_mode: true,
            is_pending_dismiss,
            ..
        } = self.state
        else {
            return Vec::new();
        };
        if self.prompt_dirty && !is_pending_dismiss {
            self.set_state(ActivationState::Active {
                phase: ActivePhase::Frozen,
                is_prompt_mode: true,
                is_pending_dismiss: true,
            });
            return vec![Intent::PendingDismiss];
        }
        self.deactivate(DeactivationReason::PromptDismissed, scheduler)
    }

    pub fn resume_prompt(&mut self) {
        if self.state.is_pending_dismiss() {
            self.set_state(ActivationState::Active {
                phase: ActivePhase::Frozen,
                is_prompt_mode: true,
                is_pending_dismiss: false,
            });
        }
    }

    /// Leave prompt mode but stay active with the selection frozen.
    pub fn exit_prompt(&mut self) -> Vec<Intent> {
        if !self.state.is_prompt_mode() {
            return Vec::new();
        }
        self.prompt_dirty = false;
        self.set_state(ActivationState::active(ActivePhase::Frozen));
        vec![Intent::PromptModeChanged(false)]
    }
}
