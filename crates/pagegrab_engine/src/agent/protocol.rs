//! Protocol types between the agent manager and its session workers.

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use pagegrab_core::{ElementId, ElementInfo, GrabError, Point};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a provider can do beyond a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub supports_undo: bool,
    pub supports_follow_up: bool,
}

/// Everything a provider needs to run one prompt.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub session_id: String,
    pub prompt: String,
    pub elements: Vec<ElementInfo>,
    /// Snippet generated for the elements.
    pub content: String,
    /// Earlier prompts of the same session, oldest first.
    pub previous_prompts: Vec<String>,
}

impl AgentContext {
    pub fn is_follow_up(&self) -> bool {
        !self.previous_prompts.is_empty()
    }
}

/// Cooperative cancellation flag shared with a running provider call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Events produced by session workers and drained by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Progress text streamed by the provider.
    Status {
        session_id: String,
        generation: u64,
        text: String,
    },
    /// The provider finished the run.
    Completed { session_id: String, generation: u64 },
    /// The provider failed.
    Failed {
        session_id: String,
        generation: u64,
        message: String,
    },
}

impl AgentEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Status { session_id, .. }
            | Self::Completed { session_id, .. }
            | Self::Failed { session_id, .. } => session_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Self::Status { generation, .. }
            | Self::Completed { generation, .. }
            | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Handle a provider uses to stream status text for its run.
#[derive(Debug, Clone)]
pub struct StatusSink {
    pub(crate) evt_tx: Sender<AgentEvent>,
    pub(crate) session_id: String,
    pub(crate) generation: u64,
}

impl StatusSink {
    pub fn status(&self, text: impl Into<String>) {
        let _ = self.evt_tx.send(AgentEvent::Status {
            session_id: self.session_id.clone(),
            generation: self.generation,
            text: text.into(),
        });
    }
}

/// Remote agent backend.
///
/// `send` runs on a session worker thread and may block; it should check
/// `cancel` between steps and stream progress through `updates`.
pub trait AgentProvider: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn send(&self, context: AgentContext, updates: &StatusSink, cancel: &CancelToken) -> Result<(), GrabError>;

    /// Provider-side abort, called in addition to setting the cancel token.
    fn abort(&self, _session_id: &str) {}

    fn undo(&self, _session_id: &str) -> Result<(), GrabError> {
        Err(GrabError::Unsupported("undo".to_string()))
    }

    fn redo(&self, _session_id: &str) -> Result<(), GrabError> {
        Err(GrabError::Unsupported("redo".to_string()))
    }

    fn check_connection(&self) -> Result<bool, GrabError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Streaming,
    Completed,
    Error,
    Aborted,
    Undone,
}

/// One prompt-and-run conversation with the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSession {
    pub id: String,
    pub prompt: String,
    /// Earlier prompts replaced by follow-ups, oldest first.
    pub previous_prompts: Vec<String>,
    pub elements: Vec<ElementId>,
    #[serde(skip)]
    pub element_infos: Vec<ElementInfo>,
    /// Viewport position the session label is anchored to.
    pub position: Point,
    pub status: String,
    pub phase: SessionPhase,
    pub is_streaming: bool,
    pub error: Option<String>,
    pub capabilities: Capabilities,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) generation: u64,
}

/// Prompt text and elements handed back for re-editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredInput {
    pub session_id: String,
    pub prompt: String,
    pub elements: Vec<ElementId>,
}

/// A new prompt for the provider.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub prompt: String,
    pub elements: Vec<ElementInfo>,
    pub content: String,
    pub position: Point,
    /// Continue an existing session instead of creating one.
    pub session_id: Option<String>,
}
