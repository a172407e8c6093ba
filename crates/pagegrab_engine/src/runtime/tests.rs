use super::*;
use crate::activation::ActivePhase;
use crate::agent::protocol::{AgentContext, CancelToken, Capabilities, SessionPhase, StatusSink};
use crate::input::{InputEvent, Key, KeyEvent, Modifiers, PointerEvent};
use crate::lookup::SourceLocation;
use crate::placement::anchor::PanelKind;
use crate::plugin::actions::{ActionEffect, PluginAction};
use crate::plugin::hooks::LifecycleHook;
use crate::selection::feedback::LabelStatus;
use pagegrab_core::{ActivationMode, Edge, GrabError, MemoryElement, MemoryTree, OverlayBounds, Rect, Size};
use std::sync::Mutex;
use std::time::Duration;

fn page() -> MemoryTree {
    MemoryTree::from_elements([
        MemoryElement::new(1, "body", Rect::new(0.0, 0.0, 1000.0, 800.0)).ineligible(),
        MemoryElement::new(2, "button", Rect::new(20.0, 20.0, 60.0, 30.0))
            .with_parent(Some(1))
            .with_component("SaveButton"),
        MemoryElement::new(3, "button", Rect::new(100.0, 20.0, 60.0, 30.0)).with_parent(Some(1)),
        MemoryElement::new(4, "button", Rect::new(180.0, 60.0, 20.0, 30.0)).with_parent(Some(1)),
        MemoryElement::new(5, "p", Rect::new(400.0, 400.0, 200.0, 50.0))
            .with_parent(Some(1))
            .with_text("Hello"),
    ])
}

struct Fixture {
    runtime: EngineRuntime,
    tree: Arc<MemoryTree>,
    clipboard: MemoryClipboard,
    now: Instant,
}

impl Fixture {
    fn with(config: Config, adjust: impl FnOnce(&mut Collaborators)) -> Self {
        let tree = Arc::new(page());
        let clipboard = MemoryClipboard::new();
        let mut collaborators = Collaborators::in_memory(tree.clone());
        collaborators.clipboard = Box::new(clipboard.clone());
        adjust(&mut collaborators);
        Self {
            runtime: EngineRuntime::new(config, collaborators, Viewport::new(1000.0, 800.0)),
            tree,
            clipboard,
            now: Instant::now(),
        }
    }

    fn hold_mode() -> Self {
        Self::with(Config::default(), |_| {})
    }

    fn toggle_mode(keep_active_after_copy: bool) -> Self {
        Self::with(
            Config {
                activation_mode: ActivationMode::Toggle,
                keep_active_after_copy,
                ..Config::default()
            },
            |_| {},
        )
    }

    fn input(&mut self, event: InputEvent) {
        self.runtime.handle_input(event, self.now);
    }

    fn advance(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.runtime.tick(self.now);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        self.input(InputEvent::PointerMove(PointerEvent::at(x, y)));
    }

    fn press_combo(&mut self) {
        self.input(InputEvent::KeyDown(KeyEvent::new(Key::Char('c'), Modifiers::COMMAND)));
    }

    fn release_combo(&mut self) {
        self.input(InputEvent::KeyUp(KeyEvent::new(Key::Char('c'), Modifiers::NONE)));
    }

    fn activate_by_hold(&mut self) {
        self.press_combo();
        self.advance(150);
        assert!(self.runtime.state().is_active());
    }

    fn snapshot(&mut self) -> EngineSnapshot {
        self.runtime.snapshot(self.now)
    }
}

fn sorted(mut ids: Vec<ElementId>) -> Vec<ElementId> {
    ids.sort();
    ids
}

#[test]
fn hold_over_button_activates_and_release_returns_to_idle() {
    let mut f = Fixture::hold_mode();
    f.move_to(30.0, 30.0);
    f.press_combo();
    f.advance(100);
    assert!(f.runtime.state().is_holding());
    f.advance(50);

    let snapshot = f.snapshot();
    assert!(snapshot.is_active);
    assert_eq!(snapshot.phase, Some(ActivePhase::Normal));
    assert_eq!(snapshot.target_element, Some(ElementId(2)));
    assert_eq!(
        snapshot.selection_bounds.map(|bounds| bounds.rect()),
        Some(Rect::new(20.0, 20.0, 60.0, 30.0))
    );

    f.release_combo();
    assert!(f.runtime.state().is_idle());
    assert_eq!(f.snapshot().target_element, None);
}

#[test]
fn drag_freezes_the_three_buttons_and_copies_them_once() {
    let mut f = Fixture::hold_mode();
    f.move_to(10.0, 10.0);
    f.activate_by_hold();

    f.input(InputEvent::PointerDown(PointerEvent::at(10.0, 10.0)));
    f.move_to(110.0, 60.0);
    f.move_to(210.0, 110.0);
    f.advance(40);
    let forming = f.snapshot();
    assert!(forming.is_dragging);
    assert_eq!(
        sorted(forming.drag_preview),
        vec![ElementId(2), ElementId(3), ElementId(4)]
    );
    assert_eq!(
        forming.drag_bounds.map(|bounds| bounds.rect()),
        Some(Rect::new(10.0, 10.0, 200.0, 100.0))
    );

    f.input(InputEvent::PointerUp(PointerEvent::at(210.0, 110.0)));
    let copied = f.snapshot();
    assert_eq!(copied.activation, "just_copied");
    assert_eq!(
        sorted(copied.frozen_elements.clone()),
        vec![ElementId(2), ElementId(3), ElementId(4)]
    );
    assert_eq!(
        copied.selection_bounds.map(|bounds| bounds.rect()),
        Some(Rect::new(20.0, 20.0, 180.0, 70.0))
    );
    assert_eq!(copied.grabbed_boxes.len(), 3);
    assert_eq!(copied.label_instances.len(), 1);
    assert_eq!(copied.label_instances[0].status, LabelStatus::Copied);
    assert_eq!(f.clipboard.writes().len(), 1);
    assert_eq!(f.runtime.history().len(), 1);
    assert_eq!(f.runtime.history()[0].elements_count, 3);
    assert!(copied.has_unread_history);

    // The trailing host click after a drag must not copy again.
    f.input(InputEvent::Click(PointerEvent::at(210.0, 110.0)));
    assert_eq!(f.clipboard.writes().len(), 1);

    f.release_combo();
    f.advance(1_500);
    let settled = f.snapshot();
    assert!(!settled.is_active);
    assert_eq!(settled.activation, "idle");
    assert!(settled.grabbed_boxes.is_empty());
    assert_eq!(settled.label_instances[0].status, LabelStatus::Fading);

    f.advance(300);
    assert!(f.snapshot().label_instances.is_empty());
}

#[test]
fn copy_returns_to_following_while_the_combo_is_held() {
    let mut f = Fixture::hold_mode();
    f.move_to(30.0, 30.0);
    f.activate_by_hold();
    f.input(InputEvent::PointerDown(PointerEvent::at(30.0, 30.0)));
    f.input(InputEvent::PointerUp(PointerEvent::at(30.0, 30.0)));
    assert_eq!(f.clipboard.writes().len(), 1);
    assert!(f.clipboard.last().unwrap_or_default().contains("SaveButton"));

    f.advance(1_500);
    let snapshot = f.snapshot();
    assert_eq!(snapshot.phase, Some(ActivePhase::Normal));
    assert_eq!(snapshot.target_element, Some(ElementId(2)));
}

#[test]
fn repeated_copies_replace_history_but_distinct_comments_do_not() {
    let mut f = Fixture::toggle_mode(false);
    assert!(f.runtime.copy_elements(&[ElementId(2)], f.now));
    f.advance(1_500);
    assert!(f.runtime.state().is_idle());
    assert!(f.runtime.copy_elements(&[ElementId(2)], f.now));
    f.advance(1_500);
    assert_eq!(f.clipboard.writes().len(), 2);
    assert_eq!(f.runtime.history().len(), 1);

    f.move_to(30.0, 30.0);
    for comment in ["make it red", "make it blue", "make it blue"] {
        f.runtime.activate(f.now);
        assert!(f.runtime.enter_prompt_mode(f.now));
        f.runtime.set_prompt_input(comment, f.now);
        assert_eq!(f.runtime.submit_prompt(f.now).expect("submit"), None);
        f.advance(1_500);
        assert!(f.runtime.state().is_idle());
    }

    let history = f.runtime.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].comment_text.as_deref(), Some("make it blue"));
    assert_eq!(history[1].comment_text.as_deref(), Some("make it red"));
    assert!(!history[2].is_comment);
}

#[test]
fn click_on_empty_space_deactivates_without_copying() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.input(InputEvent::PointerDown(PointerEvent::at(900.0, 700.0)));
    f.input(InputEvent::PointerUp(PointerEvent::at(900.0, 700.0)));
    assert!(f.runtime.state().is_idle());
    assert!(f.clipboard.writes().is_empty());
    assert!(f.runtime.history().is_empty());
}

#[test]
fn copying_a_detached_element_fails_closed() {
    let mut f = Fixture::toggle_mode(false);
    f.tree.detach(ElementId(2));
    assert!(!f.runtime.copy_elements(&[ElementId(2)], f.now));
    assert!(f.runtime.state().is_idle());
    assert!(f.clipboard.writes().is_empty());
    assert!(f.snapshot().label_instances.is_empty());
}

#[test]
fn failed_clipboard_write_settles_the_label_as_error() {
    let mut f = Fixture::toggle_mode(false);
    f.clipboard.set_failure(Some("denied"));
    assert!(f.runtime.copy_elements(&[ElementId(3)], f.now));
    let snapshot = f.snapshot();
    assert_eq!(snapshot.label_instances[0].status, LabelStatus::Error);
    assert!(snapshot.label_instances[0]
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("denied")));
    assert!(f.runtime.history().is_empty());

    f.advance(1_500);
    assert_eq!(f.snapshot().label_instances[0].status, LabelStatus::Fading);
}

#[test]
fn escape_clears_feedback_but_copy_finish_keeps_it() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.copy_elements(&[ElementId(2)], f.now);
    f.input(InputEvent::KeyDown(KeyEvent::new(Key::Escape, Modifiers::NONE)));
    let snapshot = f.snapshot();
    assert!(snapshot.label_instances.is_empty());
    assert!(snapshot.grabbed_boxes.is_empty());
    assert!(f.runtime.next_deadline().is_some(), "history flash still pending");

    f.runtime.copy_elements(&[ElementId(2)], f.now);
    f.advance(1_000);
    assert!(!f.snapshot().label_instances.is_empty());
}

#[test]
fn hovered_label_does_not_fade() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.copy_elements(&[ElementId(5)], f.now);
    let label = f.snapshot().label_instances[0].id;
    f.runtime.set_label_hovered(label, true, f.now);
    f.advance(5_000);
    assert_eq!(f.snapshot().label_instances[0].status, LabelStatus::Copied);

    f.runtime.set_label_hovered(label, false, f.now);
    f.advance(1_500);
    f.advance(300);
    assert!(f.snapshot().label_instances.is_empty());
}

#[test]
fn hover_hit_tests_are_throttled_with_a_trailing_edge() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));

    f.move_to(130.0, 30.0);
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));
    f.advance(16);
    assert_eq!(f.snapshot().target_element, Some(ElementId(3)));
}

#[test]
fn copy_of_detached_elements_during_feedback_is_refused() {
    let mut f = Fixture::toggle_mode(true);
    f.runtime.activate(f.now);
    assert!(f.runtime.copy_elements(&[ElementId(2)], f.now));
    assert_eq!(f.runtime.state(), crate::activation::ActivationState::JustCopied);

    f.tree.detach(ElementId(3));
    assert!(!f.runtime.copy_elements(&[ElementId(3)], f.now));
    assert_eq!(f.runtime.state(), crate::activation::ActivationState::JustCopied);
    assert_eq!(f.snapshot().activation, "just_copied");
    assert_eq!(f.clipboard.writes().len(), 1);

    f.advance(1_500);
    assert!(f.runtime.state().is_active());
}

#[test]
fn trailing_hit_test_uses_only_the_latest_point() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    let hovered = Arc::new(Mutex::new(Vec::new()));
    f.runtime.register_plugin(Plugin::new("hover-log").with_lifecycle(Recorder {
        events: hovered.clone(),
    }));

    f.advance(4);
    f.move_to(130.0, 30.0);
    f.advance(4);
    f.move_to(420.0, 420.0);
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));

    // The trailing test is due one throttle window after the first parked move.
    f.advance(12);
    assert_eq!(f.snapshot().target_element, Some(ElementId(5)));
    let calls = hovered.lock().expect("lock");
    assert!(calls.iter().any(|call| call == "hover:p"));
    assert!(!calls.iter().any(|call| call == "hover:button"));
}

#[test]
fn superseded_hit_test_answer_is_dropped() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);

    let older = f.runtime.selection.hit_test_now(Point::new(130.0, 30.0), f.now);
    let newer = f.runtime.selection.hit_test_now(Point::new(420.0, 420.0), f.now);
    f.runtime.apply_hit_result(older, Some(ElementId(3)), f.now);
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));

    f.runtime.apply_hit_result(newer, Some(ElementId(5)), f.now);
    assert_eq!(f.snapshot().target_element, Some(ElementId(5)));
}

#[test]
fn hit_test_answer_past_the_staleness_window_is_dropped() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);

    let ticket = f.runtime.selection.hit_test_now(Point::new(130.0, 30.0), f.now);
    f.now += Duration::from_millis(251);
    f.runtime.apply_hit_result(ticket, Some(ElementId(3)), f.now);
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));
}

#[test]
fn scrolling_moves_the_selection_bounds() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    f.input(InputEvent::Scroll {
        scroll_x: 0.0,
        scroll_y: 10.0,
    });
    let snapshot = f.snapshot();
    assert_eq!(snapshot.viewport_version, 1);
    assert_eq!(
        snapshot.selection_bounds.map(|bounds| bounds.rect()),
        Some(Rect::new(20.0, 10.0, 60.0, 30.0))
    );
}

#[test]
fn arrow_keys_move_a_frozen_single_selection() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    f.input(InputEvent::KeyDown(KeyEvent::new(Key::ArrowRight, Modifiers::NONE)));
    let snapshot = f.snapshot();
    assert_eq!(snapshot.phase, Some(ActivePhase::Frozen));
    assert_eq!(snapshot.target_element, Some(ElementId(3)));
    assert_eq!(snapshot.frozen_elements, vec![ElementId(3)]);

    f.input(InputEvent::KeyDown(KeyEvent::new(Key::Enter, Modifiers::NONE)));
    assert_eq!(f.clipboard.writes().len(), 1);
    assert_eq!(f.runtime.history()[0].elements_count, 1);
}

#[test]
fn context_menu_lists_actions_and_runs_them_on_the_frozen_target() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.register_plugin(
        Plugin::new("inspector").with_action(PluginAction::new("close", "Close", |_| Ok(ActionEffect::Deactivate))),
    );
    f.runtime.activate(f.now);
    f.move_to(110.0, 30.0);
    f.input(InputEvent::ContextMenu(PointerEvent::at(110.0, 30.0)));

    let snapshot = f.snapshot();
    assert_eq!(snapshot.phase, Some(ActivePhase::Frozen));
    let menu = snapshot.context_menu.expect("menu open");
    assert_eq!(menu.elements, vec![ElementId(3)]);
    let ids: Vec<&str> = menu.actions.iter().map(|action| action.id.as_str()).collect();
    assert_eq!(ids, vec!["copy", "comment", "close"]);

    f.runtime.run_action("comment", f.now).expect("comment");
    let prompt = f.snapshot();
    assert!(prompt.is_prompt_mode);
    assert!(prompt.context_menu.is_none());
    assert_eq!(prompt.frozen_elements, vec![ElementId(3)]);

    f.runtime.cancel_prompt(f.now);
    assert!(f.runtime.state().is_idle());

    f.runtime.activate(f.now);
    f.input(InputEvent::ContextMenu(PointerEvent::at(110.0, 30.0)));
    f.runtime.run_action("close", f.now).expect("close");
    assert!(f.runtime.state().is_idle());
    assert!(matches!(f.runtime.run_action("missing", f.now), Err(GrabError::NotFound)));
}

#[test]
fn failing_action_leaves_state_alone() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.register_plugin(Plugin::new("broken").with_action(PluginAction::new(
        "explode",
        "Explode",
        |_| Err(GrabError::plugin("broken", "no")),
    )));
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    assert!(f.runtime.run_action("explode", f.now).is_err());
    assert!(f.runtime.state().is_active());
    assert_eq!(f.snapshot().target_element, Some(ElementId(2)));
}

#[test]
fn tab_cycles_actions_and_enter_runs_the_cycled_one() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    let tab = KeyEvent::new(Key::Tab, Modifiers::NONE);
    f.input(InputEvent::KeyDown(tab));
    f.input(InputEvent::KeyDown(tab));
    let snapshot = f.snapshot();
    assert!(snapshot.action_cycle.is_visible);
    assert_eq!(snapshot.action_cycle.active_index, Some(1));

    f.input(InputEvent::KeyDown(KeyEvent::new(Key::Enter, Modifiers::NONE)));
    let prompt = f.snapshot();
    assert!(prompt.is_prompt_mode);
    assert!(!prompt.action_cycle.is_visible);
    assert!(f.clipboard.writes().is_empty());
}

#[test]
fn unsaved_prompt_needs_a_second_cancel() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    assert!(f.runtime.enter_prompt_mode(f.now));
    f.runtime.set_prompt_input("draft", f.now);

    f.input(InputEvent::KeyDown(KeyEvent::new(Key::Escape, Modifiers::NONE)));
    assert!(f.snapshot().is_pending_dismiss);
    f.runtime.set_prompt_input("draft, longer", f.now);
    assert!(!f.snapshot().is_pending_dismiss);

    f.runtime.cancel_prompt(f.now);
    assert!(f.snapshot().is_pending_dismiss);
    f.runtime.cancel_prompt(f.now);
    let snapshot = f.snapshot();
    assert!(!snapshot.is_active);
    assert!(snapshot.prompt_input.is_empty());
}

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl LifecycleHook for Recorder {
    fn on_activate(&self) {
        self.events.lock().expect("lock").push("activate".to_string());
    }

    fn on_deactivate(&self) {
        self.events.lock().expect("lock").push("deactivate".to_string());
    }

    fn on_element_hover(&self, element: Option<&ElementInfo>) {
        let name = element.map(|info| info.tag_name.clone()).unwrap_or_default();
        self.events.lock().expect("lock").push(format!("hover:{name}"));
    }

    fn on_before_copy(&self, elements: &[ElementInfo]) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("before_copy:{}", elements.len()));
    }

    fn on_after_copy(&self, _elements: &[ElementInfo], success: bool) {
        self.events
            .lock()
            .expect("lock")
            .push(format!("after_copy:{success}"));
    }
}

#[test]
fn lifecycle_hooks_fire_in_order() {
    let mut f = Fixture::toggle_mode(false);
    let events = Arc::new(Mutex::new(Vec::new()));
    f.runtime.register_plugin(Plugin::new("recorder").with_lifecycle(Recorder {
        events: events.clone(),
    }));
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    f.input(InputEvent::PointerDown(PointerEvent::at(30.0, 30.0)));
    f.input(InputEvent::PointerUp(PointerEvent::at(30.0, 30.0)));
    f.advance(1_500);

    let events = events.lock().expect("lock").clone();
    assert_eq!(
        events,
        vec!["activate", "hover:button", "before_copy:1", "after_copy:true", "deactivate"]
    );
}

#[test]
fn subscribers_only_see_changed_snapshots() {
    let mut f = Fixture::toggle_mode(false);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = f.runtime.subscribe(move |snapshot| {
        sink.lock().expect("lock").push(snapshot.activation);
    });
    f.runtime.activate(f.now);
    f.runtime.tick(f.now);
    f.runtime.tick(f.now);
    f.runtime.deactivate(f.now);
    assert_eq!(*seen.lock().expect("lock"), vec!["active", "idle"]);

    assert!(f.runtime.unsubscribe(id));
    f.runtime.activate(f.now);
    assert_eq!(seen.lock().expect("lock").len(), 2);
}

#[test]
fn disabling_deactivates_ignores_input_and_persists() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.runtime.set_enabled(false, f.now);
    assert!(f.runtime.state().is_idle());
    assert!(!f.runtime.toolbar_state().enabled);

    f.press_combo();
    f.advance(500);
    assert!(f.runtime.state().is_idle());
    assert!(!f.runtime.copy_elements(&[ElementId(2)], f.now));

    f.runtime.set_enabled(true, f.now);
    f.runtime.activate(f.now);
    assert!(f.runtime.state().is_active());
}

#[test]
fn history_preview_pins_boxes_until_cleared() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.copy_elements(&[ElementId(3)], f.now);
    f.advance(2_000);
    assert!(f.snapshot().grabbed_boxes.is_empty());

    let id = f.runtime.history()[0].id.clone();
    assert_eq!(f.runtime.preview_history_item(&id, f.now).expect("preview"), 1);
    f.advance(10_000);
    let snapshot = f.snapshot();
    assert_eq!(snapshot.grabbed_boxes.len(), 1);
    assert!(snapshot.grabbed_boxes[0].pinned);
    assert_eq!(
        snapshot.grabbed_boxes[0].bounds,
        OverlayBounds::from_rect(Rect::new(100.0, 20.0, 60.0, 30.0))
    );

    assert_eq!(f.runtime.clear_history_preview(f.now), 1);
    assert!(matches!(
        f.runtime.preview_history_item("nope", f.now),
        Err(GrabError::NotFound)
    ));
}

#[test]
fn history_remove_clear_and_unread() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.copy_elements(&[ElementId(2)], f.now);
    f.advance(1_500);
    f.runtime.copy_elements(&[ElementId(3)], f.now);
    f.advance(1_500);
    assert!(f.snapshot().has_unread_history);

    f.runtime.open_panel(PanelKind::History, Size::new(300.0, 200.0), f.now);
    assert!(!f.snapshot().has_unread_history);

    let oldest = f.runtime.history()[1].id.clone();
    assert!(f.runtime.remove_history_item(&oldest, f.now));
    assert_eq!(f.runtime.history().len(), 1);
    f.runtime.clear_history(f.now);
    assert!(f.runtime.history().is_empty());
}

#[test]
fn toolbar_fling_snaps_to_top_and_notifies_subscribers() {
    let mut f = Fixture::toggle_mode(false);
    let saved = Arc::new(Mutex::new(Vec::new()));
    let sink = saved.clone();
    f.runtime.subscribe_toolbar(move |state| sink.lock().expect("lock").push(*state));

    let start = f.now;
    f.runtime.begin_toolbar_drag(Point::new(500.0, 764.0), start);
    f.runtime
        .drag_toolbar(Point::new(500.0, 300.0), start + Duration::from_millis(50));
    f.runtime
        .drag_toolbar(Point::new(500.0, 100.0), start + Duration::from_millis(100));
    let state = f.runtime.end_toolbar_drag(start + Duration::from_millis(100));
    assert_eq!(state.edge, Edge::Top);

    let saved = saved.lock().expect("lock").clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].edge, Edge::Top);

    let done = start + Duration::from_millis(300);
    assert!(!f.runtime.animation_frame(done));
    assert_eq!(
        f.runtime.snapshot(done).toolbar_rect,
        Rect::new(380.0, 16.0, 240.0, 40.0)
    );
}

#[test]
fn open_panels_are_tracked_every_frame_until_dismissed() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.open_panel(PanelKind::Menu, Size::new(300.0, 200.0), f.now);
    assert!(f.snapshot().panels.is_empty());

    assert!(f.runtime.animation_frame(f.now));
    let panels = f.snapshot().panels;
    assert_eq!(panels.len(), 1);
    assert_eq!(panels[0].rect, Rect::new(350.0, 536.0, 300.0, 200.0));

    assert!(f.runtime.dismiss_panel(PanelKind::Menu, f.now));
    assert!(!f.runtime.animation_frame(f.now));
    assert!(f.snapshot().panels.is_empty());
}

#[test]
fn collapsing_the_toolbar_persists_the_placement() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.set_toolbar_collapsed(true, f.now);
    let snapshot = f.snapshot();
    assert!(snapshot.toolbar_state.collapsed);
    assert_eq!(snapshot.toolbar_rect, Rect::new(480.0, 744.0, 40.0, 40.0));
}

struct StubLocator;

impl SourceLocator for StubLocator {
    fn locate(&self, element: &ElementInfo) -> Option<SourceLocation> {
        Some(SourceLocation {
            file_path: format!("src/components/{}.tsx", element.display_name()),
            line: 12,
            column: Some(4),
        })
    }
}

#[test]
fn hovering_resolves_the_target_source_in_the_background() {
    let mut f = Fixture::with(
        Config {
            activation_mode: ActivationMode::Toggle,
            ..Config::default()
        },
        |collaborators| collaborators.source_locator = Some(Arc::new(StubLocator)),
    );
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    for _ in 0..200 {
        if f.snapshot().target.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
        f.runtime.tick(f.now);
    }
    let target = f.snapshot().target.expect("resolved");
    assert_eq!(target.element, Some(ElementId(2)));
    assert_eq!(target.component_name.as_deref(), Some("SaveButton"));
    assert_eq!(
        target.source.map(|source| source.file_path),
        Some("src/components/SaveButton.tsx".to_string())
    );

    f.runtime.deactivate(f.now);
    assert!(f.snapshot().target.is_none());
}

#[derive(Default)]
struct EchoProvider {
    follow_up: bool,
    prompts: Mutex<Vec<String>>,
}

impl AgentProvider for EchoProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_undo: true,
            supports_follow_up: self.follow_up,
        }
    }

    fn send(&self, context: AgentContext, updates: &StatusSink, cancel: &CancelToken) -> Result<(), GrabError> {
        self.prompts.lock().expect("lock").push(context.prompt.clone());
        updates.status("thinking");
        if context.prompt.contains("block") {
            let started = Instant::now();
            while !cancel.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }

    fn undo(&self, _session_id: &str) -> Result<(), GrabError> {
        Ok(())
    }
}

fn with_agent(provider: Arc<EchoProvider>) -> Fixture {
    Fixture::with(
        Config {
            activation_mode: ActivationMode::Toggle,
            ..Config::default()
        },
        move |collaborators| collaborators.agent_provider = Some(provider),
    )
}

fn wait_until(f: &mut Fixture, done: impl Fn(&EngineRuntime) -> bool) {
    for _ in 0..200 {
        if done(&f.runtime) {
            return;
        }
        f.runtime.wait_for_agent(Duration::from_millis(25), f.now);
    }
    panic!("condition not reached");
}

fn submit_on_save_button(f: &mut Fixture, prompt: &str) -> String {
    f.runtime.activate(f.now);
    f.move_to(30.0, 30.0);
    assert!(f.runtime.enter_prompt_mode(f.now));
    f.runtime.set_prompt_input(prompt, f.now);
    f.runtime
        .submit_prompt(f.now)
        .expect("submit")
        .expect("session id")
}

#[test]
fn submitting_with_a_provider_starts_a_session_and_closes_the_overlay() {
    let provider = Arc::new(EchoProvider::default());
    let mut f = with_agent(provider.clone());
    let id = submit_on_save_button(&mut f, "make it red");
    assert!(f.runtime.state().is_idle());
    assert!(f.clipboard.writes().is_empty());

    wait_until(&mut f, |runtime| {
        runtime
            .agent_sessions()
            .iter()
            .any(|session| session.id == id && session.phase == SessionPhase::Completed)
    });
    let session = &f.runtime.agent_sessions()[0];
    assert_eq!(session.elements, vec![ElementId(2)]);
    assert_eq!(session.prompt, "make it red");

    let restored = f.runtime.undo_session(&id, f.now).expect("undo");
    assert_eq!(restored.prompt, "make it red");
    let snapshot = f.snapshot();
    assert!(snapshot.is_prompt_mode);
    assert_eq!(snapshot.prompt_input, "make it red");
    f.runtime.redo_session(&id, f.now).expect("redo");
}

#[test]
fn aborting_a_session_restores_its_prompt() {
    let provider = Arc::new(EchoProvider::default());
    let mut f = with_agent(provider);
    let id = submit_on_save_button(&mut f, "block until aborted");
    assert!(f.runtime.agent_sessions()[0].is_streaming);

    let restored = f.runtime.abort_session(&id, f.now).expect("aborted");
    assert_eq!(restored.prompt, "block until aborted");
    let snapshot = f.snapshot();
    assert!(snapshot.is_prompt_mode);
    assert_eq!(snapshot.prompt_input, "block until aborted");
    assert_eq!(snapshot.frozen_elements, vec![ElementId(2)]);
    assert_eq!(snapshot.agent_sessions[0].phase, SessionPhase::Aborted);
}

#[test]
fn follow_up_reuses_the_session_id() {
    let provider = Arc::new(EchoProvider {
        follow_up: true,
        ..EchoProvider::default()
    });
    let mut f = with_agent(provider.clone());
    let id = submit_on_save_button(&mut f, "first");
    wait_until(&mut f, |runtime| !runtime.agent_sessions()[0].is_streaming);

    f.runtime.follow_up(&id, f.now).expect("follow up");
    assert!(f.snapshot().is_prompt_mode);
    f.runtime.set_prompt_input("second", f.now);
    let again = f.runtime.submit_prompt(f.now).expect("submit").expect("id");
    assert_eq!(again, id);
    wait_until(&mut f, |runtime| !runtime.agent_sessions()[0].is_streaming);

    let sessions = f.runtime.agent_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].previous_prompts, vec!["first".to_string()]);
    assert_eq!(
        *provider.prompts.lock().expect("lock"),
        vec!["first".to_string(), "second".to_string()]
    );
}

#[test]
fn dispose_stops_everything() {
    let mut f = Fixture::toggle_mode(false);
    f.runtime.activate(f.now);
    f.runtime.copy_elements(&[ElementId(2)], f.now);
    f.runtime.dispose(f.now);
    assert!(f.runtime.is_disposed());
    assert!(f.runtime.state().is_idle());
    assert!(f.runtime.scheduler().is_empty());

    f.press_combo();
    f.advance(500);
    assert!(f.runtime.state().is_idle());
}
