use super::*;
use crate::agent::protocol::StatusSink;
use pagegrab_core::{ElementId, ElementInfo, Point};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Default)]
struct ScriptedProvider {
    capabilities: Capabilities,
    finished: AtomicUsize,
    undone: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn with_capabilities(capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            capabilities,
            ..Self::default()
        })
    }
}

impl AgentProvider for ScriptedProvider {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn send(&self, context: AgentContext, updates: &StatusSink, cancel: &CancelToken) -> Result<(), GrabError> {
        updates.status(format!("working on {}", context.prompt));
        if context.prompt.contains("block") {
            let started = Instant::now();
            while !cancel.is_cancelled() && started.elapsed() < Duration::from_secs(5) {
                std::thread::sleep(Duration::from_millis(5));
            }
            updates.status("late status");
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        if context.prompt.contains("fail") {
            return Err(GrabError::Provider("boom".to_string()));
        }
        Ok(())
    }

    fn abort(&self, session_id: &str) {
        self.aborted.lock().expect("lock").push(session_id.to_string());
    }

    fn undo(&self, session_id: &str) -> Result<(), GrabError> {
        self.undone.lock().expect("lock").push(session_id.to_string());
        Ok(())
    }

    fn redo(&self, _session_id: &str) -> Result<(), GrabError> {
        Ok(())
    }
}

fn element(id: u64) -> ElementInfo {
    ElementInfo {
        id: ElementId(id),
        tag_name: "div".to_string(),
        component_name: None,
        selector: format!("#e{id}"),
        text_preview: None,
    }
}

fn request(prompt: &str, session_id: Option<String>) -> StartRequest {
    StartRequest {
        prompt: prompt.to_string(),
        elements: vec![element(1)],
        content: "<div>".to_string(),
        position: Point::new(10.0, 10.0),
        session_id,
    }
}

fn settle(manager: &mut AgentManager, ids: &[&str]) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let streaming = ids
            .iter()
            .any(|id| manager.session(id).is_some_and(|session| session.is_streaming));
        if !streaming {
            return;
        }
        manager.wait_for_event(Duration::from_millis(50));
    }
    panic!("sessions did not settle");
}

fn wait_finished(provider: &ScriptedProvider, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while provider.finished.load(Ordering::SeqCst) < count {
        assert!(Instant::now() < deadline, "provider did not finish");
        std::thread::sleep(Duration::from_millis(5));
    }
    // The terminal event is sent right after the provider returns.
    std::thread::sleep(Duration::from_millis(20));
}

#[test]
fn concurrent_sessions_do_not_observe_each_other() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider));
    let ok = manager.start(request("rename button", None)).expect("start ok");
    let failing = manager.start(request("fail please", None)).expect("start failing");
    assert_ne!(ok, failing);

    settle(&mut manager, &[&ok, &failing]);

    let ok_session = manager.session(&ok).expect("ok session");
    assert_eq!(ok_session.phase, SessionPhase::Completed);
    assert!(ok_session.error.is_none());
    let failed = manager.session(&failing).expect("failed session");
    assert_eq!(failed.phase, SessionPhase::Error);
    assert!(failed.error.as_deref().is_some_and(|e| e.contains("boom")));
    assert_eq!(manager.sessions().len(), 2);
}

#[test]
fn abort_restores_prompt_and_drops_late_events() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider.clone()));
    let id = manager.start(request("block forever", None)).expect("start");
    assert!(manager.is_any_streaming());

    let restored = manager.abort(&id).expect("restored input");
    assert_eq!(restored.prompt, "block forever");
    assert_eq!(restored.elements, vec![ElementId(1)]);
    assert_eq!(provider.aborted.lock().expect("lock").as_slice(), [id.clone()]);

    wait_finished(&provider, 1);
    assert!(manager.poll().is_empty());
    let session = manager.session(&id).expect("session kept");
    assert_eq!(session.phase, SessionPhase::Aborted);
    assert_eq!(session.status, "Aborted");
    assert!(manager.abort(&id).is_none());
}

#[test]
fn follow_up_reuses_session_id() {
    let provider = ScriptedProvider::with_capabilities(Capabilities {
        supports_undo: false,
        supports_follow_up: true,
    });
    let mut manager = AgentManager::new(Some(provider));
    let id = manager.start(request("first", None)).expect("start");
    settle(&mut manager, &[&id]);

    let continued = manager
        .start(request("second", Some(id.clone())))
        .expect("follow-up");
    assert_eq!(continued, id);
    settle(&mut manager, &[&id]);

    let session = manager.session(&id).expect("session");
    assert_eq!(session.prompt, "second");
    assert_eq!(session.previous_prompts, vec!["first".to_string()]);
    assert_eq!(manager.sessions().len(), 1);
}

#[test]
fn follow_up_requires_provider_support() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider));
    let id = manager.start(request("first", None)).expect("start");
    settle(&mut manager, &[&id]);
    let err = manager
        .start(request("second", Some(id)))
        .expect_err("no follow-ups");
    assert!(matches!(err, GrabError::Unsupported(_)));
    let err = manager
        .start(request("third", Some("missing".to_string())))
        .expect_err("unknown session");
    assert!(matches!(err, GrabError::NotFound));
}

#[test]
fn undo_and_redo_round_trip_through_provider() {
    let provider = ScriptedProvider::with_capabilities(Capabilities {
        supports_undo: true,
        supports_follow_up: false,
    });
    let mut manager = AgentManager::new(Some(provider.clone()));
    let id = manager.start(request("make it red", None)).expect("start");
    settle(&mut manager, &[&id]);

    let restored = manager.undo(&id).expect("undo");
    assert_eq!(restored.prompt, "make it red");
    assert_eq!(manager.session(&id).map(|s| s.phase), Some(SessionPhase::Undone));
    assert_eq!(provider.undone.lock().expect("lock").len(), 1);

    manager.redo(&id).expect("redo");
    assert_eq!(manager.session(&id).map(|s| s.phase), Some(SessionPhase::Completed));
    assert!(matches!(manager.redo(&id), Err(GrabError::BadRequest(_))));
}

#[test]
fn undo_without_capability_is_unsupported() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider));
    let id = manager.start(request("x", None)).expect("start");
    settle(&mut manager, &[&id]);
    assert!(matches!(manager.undo(&id), Err(GrabError::Unsupported(_))));
}

#[test]
fn failed_session_can_be_retried_or_acknowledged() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider));
    let id = manager.start(request("fail once", None)).expect("start");
    settle(&mut manager, &[&id]);

    manager.retry(&id, "<div>".to_string()).expect("retry");
    assert!(manager.session(&id).is_some_and(|s| s.is_streaming && s.error.is_none()));
    settle(&mut manager, &[&id]);

    let restored = manager.acknowledge_error(&id).expect("acknowledged");
    assert_eq!(restored.prompt, "fail once");
    assert!(manager.session(&id).is_none());
}

#[test]
fn dismissed_session_ignores_its_late_events() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider.clone()));
    let id = manager.start(request("block", None)).expect("start");
    assert!(manager.dismiss(&id));
    wait_finished(&provider, 1);
    assert!(manager.poll().is_empty());
    assert!(manager.sessions().is_empty());
    assert!(!manager.dismiss(&id));
}

#[test]
fn manager_without_provider_refuses_work() {
    let mut manager = AgentManager::new(None);
    assert!(!manager.has_provider());
    assert!(matches!(
        manager.start(request("x", None)),
        Err(GrabError::Unsupported(_))
    ));
    assert!(manager.check_connection().is_err());
}

#[test]
fn blank_prompt_is_rejected() {
    let provider = ScriptedProvider::with_capabilities(Capabilities::default());
    let mut manager = AgentManager::new(Some(provider));
    assert!(matches!(
        manager.start(request("   ", None)),
        Err(GrabError::BadRequest(_))
    ));
}
