//! Copy labels and grabbed boxes.
//!
//! Each entity carries its own id, and every timer it schedules is keyed by
//! that id, so removing an entity also cancels exactly its timers.

use crate::timers::{Scheduler, TimerKind};
use pagegrab_core::geometry::{bounds_of, selection_bounds};
use pagegrab_core::{ElementId, ElementInfo, ElementTree, OverlayBounds, Viewport};
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LabelId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BoxId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Copying,
    Copied,
    Error,
    Fading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInstance {
    pub id: LabelId,
    pub bounds: OverlayBounds,
    pub tag_name: String,
    pub component_name: Option<String>,
    pub status: LabelStatus,
    pub created_at: Instant,
    pub error_message: Option<String>,
    pub elements: Vec<ElementId>,
    pub hovered: bool,
    /// Status to fall back to when hovering interrupts a fade.
    settled: Option<LabelStatus>,
}

/// Transient outline on a just-copied element. `created_at == None` marks a
/// pinned box (history preview) that never expires.
#[derive(Debug, Clone, PartialEq)]
pub struct GrabbedBox {
    pub id: BoxId,
    pub element: ElementId,
    pub bounds: OverlayBounds,
    pub created_at: Option<Instant>,
}

impl GrabbedBox {
    pub fn is_pinned(&self) -> bool {
        self.created_at.is_none()
    }
}

/// Timing knobs for labels and boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTiming {
    pub fade_delay: Duration,
    pub fade_duration: Duration,
    pub box_ttl: Duration,
}

#[derive(Debug)]
pub struct FeedbackBoard {
    timing: FeedbackTiming,
    next_id: u64,
    labels: Vec<LabelInstance>,
    boxes: Vec<GrabbedBox>,
}

impl FeedbackBoard {
    pub fn new(timing: FeedbackTiming) -> Self {
        Self {
            timing,
            next_id: 0,
            labels: Vec::new(),
            boxes: Vec::new(),
        }
    }

    fn next(&mut self) -> u64 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    pub fn labels(&self) -> &[LabelInstance] {
        &self.labels
    }

    pub fn label(&self, id: LabelId) -> Option<&LabelInstance> {
        self.labels.iter().find(|label| label.id == id)
    }

    pub fn boxes(&self) -> &[GrabbedBox] {
        &self.boxes
    }

    /// Start the label for a new copy. Older labels are dropped along with
    /// their timers.
    pub fn start_copy_label(
        &mut self,
        bounds: OverlayBounds,
        primary: &ElementInfo,
        elements: &[ElementId],
        now: Instant,
        scheduler: &mut Scheduler,
    ) -> LabelId {
        self.clear_labels(scheduler);
        let id = LabelId(self.next());
        self.labels.push(LabelInstance {
            id,
            bounds,
            tag_name: primary.tag_name.clone(),
            component_name: primary.component_name.clone(),
            status: LabelStatus::Copying,
            created_at: now,
            error_message: None,
            elements: elements.to_vec(),
            hovered: false,
            settled: None,
        });
        id
    }

    /// Record the copy result and start the fade countdown (unless hovered).
    pub fn settle_label(
        &mut self,
        id: LabelId,
        result: Result<(), String>,
        now: Instant,
        scheduler: &mut Scheduler,
    ) {
        let fade_delay = self.timing.fade_delay;
        let Some(label) = self.labels.iter_mut().find(|label| label.id == id) else {
            return;
        };
        let status = match result {
            Ok(()) => LabelStatus::Copied,
            Err(message) => {
                label.error_message = Some(message);
                LabelStatus::Error
            }
        };
        label.status = status;
        label.settled = Some(status);
        if !label.hovered {
            scheduler.restart(TimerKind::LabelFade(id), now, fade_delay);
        }
    }

    /// Hovering pauses the fade; leaving restarts the full delay.
    pub fn set_label_hovered(&mut self, id: LabelId, hovered: bool, now: Instant, scheduler: &mut Scheduler) {
        let fade_delay = self.timing.fade_delay;
        let Some(label) = self.labels.iter_mut().find(|label| label.id == id) else {
            return;
        };
        label.hovered = hovered;
        let Some(settled) = label.settled else {
            return;
        };
        if hovered {
            scheduler.cancel_kind(TimerKind::LabelFade(id));
            scheduler.cancel_kind(TimerKind::LabelRemove(id));
            label.status = settled;
        } else {
            scheduler.restart(TimerKind::LabelFade(id), now, fade_delay);
        }
    }

    pub fn on_fade_due(&mut self, id: LabelId, now: Instant, scheduler: &mut Scheduler) {
        let fade_duration = self.timing.fade_duration;
        if let Some(label) = self.labels.iter_mut().find(|label| label.id == id) {
            if label.hovered || label.settled.is_none() {
                return;
            }
            label.status = LabelStatus::Fading;
            scheduler.restart(TimerKind::LabelRemove(id), now, fade_duration);
        }
    }

    pub fn on_remove_due(&mut self, id: LabelId) {
        self.labels.retain(|label| label.id != id);
    }

    pub fn add_grabbed_box(
        &mut self,
        element: ElementId,
        bounds: OverlayBounds,
        now: Instant,
        scheduler: &mut Scheduler,
    ) -> BoxId {
        let id = BoxId(self.next());
        self.boxes.push(GrabbedBox {
            id,
            element,
            bounds,
            created_at: Some(now),
        });
        scheduler.schedule(TimerKind::GrabbedBoxExpiry(id), now, self.timing.box_ttl);
        id
    }

    pub fn pin_box(&mut self, element: ElementId, bounds: OverlayBounds) -> BoxId {
        let id = BoxId(self.next());
        self.boxes.push(GrabbedBox {
            id,
            element,
            bounds,
            created_at: None,
        });
        id
    }

    pub fn clear_pinned(&mut self) -> usize {
        let before = self.boxes.len();
        self.boxes.retain(|grabbed| !grabbed.is_pinned());
        before - self.boxes.len()
    }

    pub fn on_box_expired(&mut self, id: BoxId) {
        self.boxes.retain(|grabbed| grabbed.id != id);
    }

    fn clear_labels(&mut self, scheduler: &mut Scheduler) {
        for label in self.labels.drain(..) {
            scheduler.cancel_kind(TimerKind::LabelFade(label.id));
            scheduler.cancel_kind(TimerKind::LabelRemove(label.id));
        }
    }

    /// Drop every label and box and cancel their timers.
    pub fn clear_all(&mut self, scheduler: &mut Scheduler) {
        self.clear_labels(scheduler);
        for grabbed in self.boxes.drain(..) {
            scheduler.cancel_kind(TimerKind::GrabbedBoxExpiry(grabbed.id));
        }
    }

    /// Recompute bounds after a scroll or resize. Entities whose elements
    /// are gone keep their last bounds until they expire.
    pub fn refresh_bounds(&mut self, tree: &dyn ElementTree, viewport: &Viewport) {
        for label in &mut self.labels {
            if let Some(bounds) = selection_bounds(tree, &label.elements, viewport) {
                label.bounds = bounds;
            }
        }
        for grabbed in &mut self.boxes {
            if let Some(bounds) = bounds_of(tree, grabbed.element, viewport) {
                grabbed.bounds = bounds;
            }
        }
    }
}
