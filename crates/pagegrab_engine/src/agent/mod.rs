//! Agent session manager.
//!
//! Each submitted prompt becomes an [`AgentSession`] keyed by id. Runs
//! execute on worker threads and report back over a channel; every run is
//! stamped with a generation, and events from a generation the session has
//! moved past (aborted, retried, followed up) are dropped, so one session's
//! late events can never overwrite another run's state.

pub mod protocol;
pub mod worker;

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use pagegrab_core::GrabError;
use protocol::{
    AgentContext, AgentEvent, AgentProvider, AgentSession, CancelToken, Capabilities, RestoredInput,
    SessionPhase, StartRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct AgentManager {
    provider: Option<Arc<dyn AgentProvider>>,
    sessions: Vec<AgentSession>,
    cancels: HashMap<String, CancelToken>,
    evt_tx: Sender<AgentEvent>,
    evt_rx: Receiver<AgentEvent>,
    next_generation: u64,
}

impl AgentManager {
    pub fn new(provider: Option<Arc<dyn AgentProvider>>) -> Self {
        let (evt_tx, evt_rx) = unbounded();
        Self {
            provider,
            sessions: Vec::new(),
            cancels: HashMap::new(),
            evt_tx,
            evt_rx,
            next_generation: 0,
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.provider
            .as_ref()
            .map(|provider| provider.capabilities())
            .unwrap_or_default()
    }

    /// Sessions in creation order.
    pub fn sessions(&self) -> &[AgentSession] {
        &self.sessions
    }

    pub fn session(&self, id: &str) -> Option<&AgentSession> {
        self.sessions.iter().find(|session| session.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut AgentSession> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    pub fn is_any_streaming(&self) -> bool {
        self.sessions.iter().any(|session| session.is_streaming)
    }

    fn provider(&self) -> Result<Arc<dyn AgentProvider>, GrabError> {
        self.provider
            .clone()
            .ok_or_else(|| GrabError::Unsupported("no agent provider configured".to_string()))
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        self.next_generation
    }

    /// Submit a prompt, either as a new session or as a continuation of
    /// `request.session_id` (the id is reused).
    ///
    /// # Returns
    /// The session id.
    ///
    /// # Errors
    /// `Unsupported` without a provider or when a completed session is
    /// continued and the provider does not support follow-ups; `NotFound` for
    /// an unknown session id; `BadRequest` for a blank prompt; `Provider` if
    /// the worker cannot start.
    pub fn start(&mut self, request: StartRequest) -> Result<String, GrabError> {
        let provider = self.provider()?;
        let prompt = request.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(GrabError::BadRequest("prompt is empty".to_string()));
        }
        let capabilities = provider.capabilities();
        let generation = self.bump_generation();
        let now = Utc::now();
        let elements = request.elements.iter().map(|info| info.id).collect();

        let id = match request.session_id {
            Some(id) => {
                let session = self.session_mut(&id).ok_or(GrabError::NotFound)?;
                if session.phase == SessionPhase::Completed && !capabilities.supports_follow_up {
                    return Err(GrabError::Unsupported("follow-up prompts".to_string()));
                }
                if session.phase == SessionPhase::Completed {
                    let previous = std::mem::take(&mut session.prompt);
                    session.previous_prompts.push(previous);
                }
                session.prompt = prompt;
                session.elements = elements;
                session.element_infos = request.elements;
                session.position = request.position;
                session.capabilities = capabilities;
                session.generation = generation;
                session.updated_at = now;
                if let Some(token) = self.cancels.remove(&id) {
                    token.cancel();
                    provider.abort(&id);
                }
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                self.sessions.push(AgentSession {
                    id: id.clone(),
                    prompt,
                    previous_prompts: Vec::new(),
                    elements,
                    element_infos: request.elements,
                    position: request.position,
                    status: String::new(),
                    phase: SessionPhase::Streaming,
                    is_streaming: true,
                    error: None,
                    capabilities,
                    created_at: now,
                    updated_at: now,
                    generation,
                });
                id
            }
        };
        self.launch(&id, provider, request.content)?;
        Ok(id)
    }

    fn launch(&mut self, id: &str, provider: Arc<dyn AgentProvider>, content: String) -> Result<(), GrabError> {
        let evt_tx = self.evt_tx.clone();
        let session = self.session_mut(id).ok_or(GrabError::NotFound)?;
        session.phase = SessionPhase::Streaming;
        session.is_streaming = true;
        session.error = None;
        session.status = "Thinking".to_string();
        let context = AgentContext {
            session_id: session.id.clone(),
            prompt: session.prompt.clone(),
            elements: session.element_infos.clone(),
            content,
            previous_prompts: session.previous_prompts.clone(),
        };
        let generation = session.generation;
        let cancel = CancelToken::new();
        info!(target: "pagegrab_engine::agent", session_id = %id, generation, follow_up = context.is_follow_up(), "agent run started");

        if let Err(err) = worker::spawn_session_worker(provider, context, generation, evt_tx, cancel.clone()) {
            let message = format!("failed to start agent worker: {err}");
            if let Some(session) = self.session_mut(id) {
                session.phase = SessionPhase::Error;
                session.is_streaming = false;
                session.error = Some(message.clone());
            }
            return Err(GrabError::Provider(message));
        }
        self.cancels.insert(id.to_string(), cancel);
        Ok(())
    }

    /// Apply pending worker events without blocking.
    ///
    /// # Returns
    /// Ids of sessions that changed.
    pub fn poll(&mut self) -> Vec<String> {
        let events: Vec<AgentEvent> = self.evt_rx.try_iter().collect();
        let mut changed = Vec::new();
        for event in events {
            let id = event.session_id().to_string();
            if self.apply(event) && !changed.contains(&id) {
                changed.push(id);
            }
        }
        changed
    }

    /// Block up to `timeout` for one worker event and apply it.
    ///
    /// # Returns
    /// `true` if an event arrived and changed a session.
    pub fn wait_for_event(&mut self, timeout: Duration) -> bool {
        match self.evt_rx.recv_timeout(timeout) {
            Ok(event) => self.apply(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn apply(&mut self, event: AgentEvent) -> bool {
        let generation = event.generation();
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == event.session_id()) else {
            debug!(target: "pagegrab_engine::agent", session_id = event.session_id(), "event for dismissed session dropped");
            return false;
        };
        if session.generation != generation {
            debug!(
                target: "pagegrab_engine::agent",
                session_id = %session.id,
                generation,
                current = session.generation,
                "stale agent event dropped"
            );
            return false;
        }
        session.updated_at = Utc::now();
        match event {
            AgentEvent::Status { text, .. } => {
                if !session.is_streaming {
                    return false;
                }
                session.status = text;
            }
            AgentEvent::Completed { .. } => {
                session.phase = SessionPhase::Completed;
                session.is_streaming = false;
                session.status = "Completed".to_string();
                self.cancels.remove(&session.id);
            }
            AgentEvent::Failed { message, .. } => {
                session.phase = SessionPhase::Error;
                session.is_streaming = false;
                session.status = "Failed".to_string();
                session.error = Some(message);
                self.cancels.remove(&session.id);
            }
        }
        true
    }

    /// Cancel a streaming run. The session stays (as aborted) and its
    /// prompt is handed back for re-editing.
    pub fn abort(&mut self, id: &str) -> Option<RestoredInput> {
        let generation = self.bump_generation();
        let provider = self.provider.clone();
        let session = self.sessions.iter_mut().find(|s| s.id == id)?;
        if !session.is_streaming {
            return None;
        }
        if let Some(token) = self.cancels.remove(id) {
            token.cancel();
        }
        if let Some(provider) = provider {
            provider.abort(id);
        }
        session.generation = generation;
        session.phase = SessionPhase::Aborted;
        session.is_streaming = false;
        session.status = "Aborted".to_string();
        session.updated_at = Utc::now();
        info!(target: "pagegrab_engine::agent", session_id = %id, "agent run aborted");
        Some(RestoredInput {
            session_id: session.id.clone(),
            prompt: session.prompt.clone(),
            elements: session.elements.clone(),
        })
    }

    /// Ask the provider to revert a completed run.
    ///
    /// # Errors
    /// `NotFound`, `Unsupported` when the provider cannot undo,
    /// `BadRequest` when the session is not completed, or the provider's
    /// own error.
    pub fn undo(&mut self, id: &str) -> Result<RestoredInput, GrabError> {
        let provider = self.provider()?;
        let session = self.session(id).ok_or(GrabError::NotFound)?;
        if !session.capabilities.supports_undo {
            return Err(GrabError::Unsupported("undo".to_string()));
        }
        if session.phase != SessionPhase::Completed {
            return Err(GrabError::BadRequest("only completed sessions can be undone".to_string()));
        }
        provider.undo(id)?;
        let session = self.session_mut(id).ok_or(GrabError::NotFound)?;
        session.phase = SessionPhase::Undone;
        session.status = "Undone".to_string();
        session.updated_at = Utc::now();
        Ok(RestoredInput {
            session_id: session.id.clone(),
            prompt: session.prompt.clone(),
            elements: session.elements.clone(),
        })
    }

    /// # Errors
    /// `NotFound`, `BadRequest` unless the session was undone, or the
    /// provider's own error.
    pub fn redo(&mut self, id: &str) -> Result<(), GrabError> {
        let provider = self.provider()?;
        let session = self.session(id).ok_or(GrabError::NotFound)?;
        if session.phase != SessionPhase::Undone {
            return Err(GrabError::BadRequest("only undone sessions can be redone".to_string()));
        }
        provider.redo(id)?;
        let session = self.session_mut(id).ok_or(GrabError::NotFound)?;
        session.phase = SessionPhase::Completed;
        session.status = "Completed".to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    /// Re-run the same prompt after an error or abort.
    ///
    /// # Errors
    /// `NotFound`, `BadRequest` for a session that did not fail, or a
    /// worker start failure.
    pub fn retry(&mut self, id: &str, content: String) -> Result<(), GrabError> {
        let provider = self.provider()?;
        let generation = self.bump_generation();
        let session = self.session_mut(id).ok_or(GrabError::NotFound)?;
        if !matches!(session.phase, SessionPhase::Error | SessionPhase::Aborted) {
            return Err(GrabError::BadRequest("only failed or aborted sessions can be retried".to_string()));
        }
        session.generation = generation;
        session.updated_at = Utc::now();
        self.launch(id, provider, content)
    }

    /// Clear a session's error and drop it, returning its prompt for
    /// re-editing.
    pub fn acknowledge_error(&mut self, id: &str) -> Option<RestoredInput> {
        let index = self
            .sessions
            .iter()
            .position(|session| session.id == id && session.error.is_some())?;
        let session = self.sessions.remove(index);
        self.cancels.remove(id);
        Some(RestoredInput {
            session_id: session.id,
            prompt: session.prompt,
            elements: session.elements,
        })
    }

    /// Remove a session, cancelling it first if it is still running.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let Some(index) = self.sessions.iter().position(|session| session.id == id) else {
            return false;
        };
        if let Some(token) = self.cancels.remove(id) {
            token.cancel();
            if let Some(provider) = &self.provider {
                provider.abort(id);
            }
        }
        self.sessions.remove(index);
        debug!(target: "pagegrab_engine::agent", session_id = %id, "session dismissed");
        true
    }

    /// # Errors
    /// `Unsupported` without a provider, or the provider's own error.
    pub fn check_connection(&self) -> Result<bool, GrabError> {
        self.provider()?.check_connection()
    }

    /// Cancel every running session and forget them all.
    pub fn shutdown(&mut self) {
        for (id, token) in self.cancels.drain() {
            token.cancel();
            if let Some(provider) = &self.provider {
                provider.abort(&id);
            }
        }
        if !self.sessions.is_empty() {
            warn!(target: "pagegrab_engine::agent", count = self.sessions.len(), "dropping agent sessions on shutdown");
        }
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests;
