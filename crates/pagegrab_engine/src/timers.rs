//! Cancellable scheduled tasks.
//!
//! Every delayed effect in the engine (hold confirmation, fades, debounces,
//! guards) is a [`TimerKind`] scheduled here instead of a free-running
//! callback. Owners cancel their tasks when they are destroyed, and a fired
//! task is only acted on if its owner still recognizes it, so a stale id can
//! never touch a newer entity.

use crate::selection::feedback::{BoxId, LabelId};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Ticket for one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a scheduled task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Hold,
    SpamGuard,
    HiddenTabGrace,
    CopiedFeedback,
    LabelFade(LabelId),
    LabelRemove(LabelId),
    GrabbedBoxExpiry(BoxId),
    DragPreview,
    HistoryFlash,
    HitTestTrailing,
}

#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    kind: TimerKind,
    deadline: Instant,
}

/// A task whose deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTask {
    pub id: TimerId,
    pub kind: TimerKind,
    pub deadline: Instant,
}

/// Deadline-ordered task table driven by caller-supplied time.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    tasks: BTreeMap<TimerId, ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `delay` after `now`.
    pub fn schedule(&mut self, kind: TimerKind, now: Instant, delay: Duration) -> TimerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = TimerId(self.next_id);
        self.tasks.insert(
            id,
            ScheduledTask {
                kind,
                deadline: now + delay,
            },
        );
        id
    }

    /// Cancel any pending task of `kind`, then schedule a fresh one.
    ///
    /// Used for restart semantics (debounce windows, guards).
    pub fn restart(&mut self, kind: TimerKind, now: Instant, delay: Duration) -> TimerId {
        self.cancel_kind(kind);
        self.schedule(kind, now, delay)
    }

    /// Cancel one task. Cancelling an unknown or already-fired id is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Cancel every pending task of `kind`.
    pub fn cancel_kind(&mut self, kind: TimerKind) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.kind != kind);
        before - self.tasks.len()
    }

    /// Cancel every pending task matching `predicate`.
    pub fn cancel_where(&mut self, predicate: impl Fn(TimerKind) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !predicate(task.kind));
        before - self.tasks.len()
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.tasks.values().any(|task| task.kind == kind)
    }

    pub fn deadline_of(&self, kind: TimerKind) -> Option<Instant> {
        self.tasks
            .values()
            .filter(|task| task.kind == kind)
            .map(|task| task.deadline)
            .min()
    }

    /// Earliest pending deadline, for hosts that sleep until the next tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.values().map(|task| task.deadline).min()
    }

    /// Remove and return the earliest task due at `now` (ties fire in
    /// scheduling order).
    pub fn pop_due(&mut self, now: Instant) -> Option<DueTask> {
        let (id, task) = self
            .tasks
            .iter()
            .filter(|(_, task)| task.deadline <= now)
            .min_by(|a, b| a.1.deadline.cmp(&b.1.deadline).then(a.0.cmp(b.0)))
            .map(|(id, task)| (*id, *task))?;
        self.tasks.remove(&id);
        Some(DueTask {
            id,
            kind: task.kind,
            deadline: task.deadline,
        })
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
