use pagegrab_core::{
    ActivationMode, Config, Database, Edge, ElementId, MemoryElement, MemoryTree, Point, Rect,
    Viewport,
};
use pagegrab_engine::{
    Collaborators, EngineRuntime, InputEvent, Key, KeyEvent, MemoryClipboard, Modifiers,
    PointerEvent,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn article() -> Arc<MemoryTree> {
    Arc::new(MemoryTree::from_elements([
        MemoryElement::new(1, "main", Rect::new(0.0, 0.0, 1280.0, 2000.0)).ineligible(),
        MemoryElement::new(10, "h1", Rect::new(40.0, 40.0, 600.0, 60.0))
            .with_parent(Some(1))
            .with_text("Release notes"),
        MemoryElement::new(11, "p", Rect::new(40.0, 120.0, 600.0, 80.0))
            .with_parent(Some(1))
            .with_text("Faster startup"),
        MemoryElement::new(12, "a", Rect::new(40.0, 1200.0, 120.0, 20.0))
            .with_parent(Some(1))
            .with_component("DocsLink"),
    ]))
}

fn toggle_config() -> Config {
    Config {
        activation_mode: ActivationMode::Toggle,
        ..Config::default()
    }
}

fn open_runtime(db_dir: &TempDir, tree: Arc<MemoryTree>, clipboard: MemoryClipboard) -> EngineRuntime {
    let database = Database::new(db_dir.path().to_str().expect("utf8 path")).expect("open db");
    let (history_store, toolbar_store) = database.into_stores();
    let mut collaborators = Collaborators::in_memory(tree);
    collaborators.clipboard = Box::new(clipboard);
    collaborators.history_store = Box::new(history_store);
    collaborators.toolbar_store = Box::new(toolbar_store);
    EngineRuntime::new(toggle_config(), collaborators, Viewport::new(1280.0, 720.0))
}

fn key(key: Key, modifiers: Modifiers) -> InputEvent {
    InputEvent::KeyDown(KeyEvent::new(key, modifiers))
}

#[test]
fn history_and_toolbar_placement_survive_a_restart() {
    let dir = TempDir::new().expect("tempdir");
    let clipboard = MemoryClipboard::new();
    let tree = article();
    let mut now = Instant::now();

    {
        let mut runtime = open_runtime(&dir, tree.clone(), clipboard.clone());
        assert!(runtime.copy_elements(&[ElementId(10)], now));
        now += Duration::from_millis(1_500);
        runtime.tick(now);
        assert!(runtime.copy_elements(&[ElementId(10), ElementId(11)], now));
        now += Duration::from_millis(1_500);
        runtime.tick(now);

        runtime.begin_toolbar_drag(Point::new(640.0, 684.0), now);
        runtime.drag_toolbar(Point::new(1200.0, 400.0), now + Duration::from_millis(60));
        runtime.drag_toolbar(Point::new(1270.0, 400.0), now + Duration::from_millis(120));
        let state = runtime.end_toolbar_drag(now + Duration::from_millis(120));
        assert_eq!(state.edge, Edge::Right);
        runtime.dispose(now);
    }

    let runtime = open_runtime(&dir, tree, clipboard.clone());
    let history = runtime.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].elements_count, 2);
    assert_eq!(history[1].tag_name, "h1");
    assert_eq!(runtime.toolbar_state().edge, Edge::Right);
    assert_eq!(clipboard.writes().len(), 2);
}

#[test]
fn scrolled_page_is_hit_tested_in_page_coordinates() {
    let dir = TempDir::new().expect("tempdir");
    let clipboard = MemoryClipboard::new();
    let mut runtime = open_runtime(&dir, article(), clipboard.clone());
    let now = Instant::now();

    runtime.handle_input(
        InputEvent::Scroll {
            scroll_x: 0.0,
            scroll_y: 1_000.0,
        },
        now,
    );
    runtime.activate(now);
    runtime.handle_input(InputEvent::PointerMove(PointerEvent::at(60.0, 210.0)), now);
    let snapshot = runtime.snapshot(now);
    assert_eq!(snapshot.target_element, Some(ElementId(12)));
    assert_eq!(
        snapshot.selection_bounds.map(|bounds| bounds.rect()),
        Some(Rect::new(40.0, 200.0, 120.0, 20.0))
    );

    runtime.handle_input(key(Key::Enter, Modifiers::NONE), now);
    let copied = clipboard.last().expect("clipboard written");
    assert!(copied.contains("DocsLink"));
}

#[test]
fn snapshot_serializes_for_hosts() {
    let dir = TempDir::new().expect("tempdir");
    let mut runtime = open_runtime(&dir, article(), MemoryClipboard::new());
    let now = Instant::now();
    runtime.activate(now);
    runtime.handle_input(InputEvent::PointerMove(PointerEvent::at(100.0, 60.0)), now);

    let value = serde_json::to_value(runtime.snapshot(now)).expect("serialize snapshot");
    assert_eq!(value["activation"], "active");
    assert_eq!(value["phase"], "normal");
    assert_eq!(value["target_element"], 10);
    assert_eq!(value["toolbar_state"]["edge"], "bottom");
    assert!(value["label_instances"].as_array().is_some_and(Vec::is_empty));
}

#[test]
fn blur_during_hold_mode_leaves_nothing_behind() {
    let dir = TempDir::new().expect("tempdir");
    let database = Database::new(dir.path().to_str().expect("utf8 path")).expect("open db");
    let (history_store, toolbar_store) = database.into_stores();
    let mut collaborators = Collaborators::in_memory(article());
    collaborators.history_store = Box::new(history_store);
    collaborators.toolbar_store = Box::new(toolbar_store);
    let mut runtime = EngineRuntime::new(Config::default(), collaborators, Viewport::new(1280.0, 720.0));
    let mut now = Instant::now();

    runtime.handle_input(InputEvent::PointerMove(PointerEvent::at(100.0, 60.0)), now);
    runtime.handle_input(key(Key::Char('c'), Modifiers::COMMAND), now);
    now += Duration::from_millis(150);
    runtime.tick(now);
    assert!(runtime.state().is_active());

    runtime.handle_input(InputEvent::WindowBlur, now);
    let snapshot = runtime.snapshot(now);
    assert!(!snapshot.is_active);
    assert_eq!(snapshot.target_element, None);
    assert!(runtime.next_deadline().is_none());

    // A repeat keydown from the still-held combo must not re-arm the hold.
    runtime.handle_input(
        InputEvent::KeyDown(KeyEvent::new(Key::Char('c'), Modifiers::COMMAND).repeated()),
        now,
    );
    now += Duration::from_millis(500);
    runtime.tick(now);
    assert!(runtime.state().is_idle());
}
