//! Replay a scripted session against an in-memory page.
//!
//! A script describes the page (a flat list of elements with parents), an
//! optional config and viewport, and timestamped steps. Each step is either
//! a host input event or an imperative command; after every step the due
//! timers are fired and the snapshot is recorded if it changed.

use pagegrab_core::geometry::Rect;
use pagegrab_core::{Config, Database, ElementId, HistoryItem, MemoryElement, MemoryTree, Viewport};
use pagegrab_engine::{Collaborators, EngineRuntime, EngineSnapshot, InputEvent, MemoryClipboard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptElement {
    pub id: u64,
    pub tag: String,
    pub rect: Rect,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_eligible")]
    pub eligible: bool,
}

fn default_eligible() -> bool {
    true
}

impl ScriptElement {
    fn to_memory_element(&self) -> MemoryElement {
        let mut element = MemoryElement::new(self.id, &self.tag, self.rect).with_parent(self.parent);
        if let Some(component) = &self.component {
            element = element.with_component(component);
        }
        if let Some(text) = &self.text {
            element = element.with_text(text);
        }
        if !self.eligible {
            element = element.ineligible();
        }
        element
    }
}

/// Imperative calls a script can make besides raw input.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptCommand {
    Activate,
    Deactivate,
    Toggle,
    SetEnabled { enabled: bool },
    CopyElements { ids: Vec<u64> },
    EnterPrompt,
    SetPrompt { text: String },
    SubmitPrompt,
    CancelPrompt,
    RunAction { id: String },
    NextAction,
    DismissContextMenu,
    ClearHistory,
    /// Only advance the clock.
    Tick,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Milliseconds since the start of the script. Must not decrease.
    pub at_ms: u64,
    #[serde(default)]
    pub input: Option<InputEvent>,
    #[serde(default)]
    pub command: Option<ScriptCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Falls back to the `PAGEGRAB_*` environment when absent.
    #[serde(default)]
    pub config: Option<Config>,
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,
    pub elements: Vec<ScriptElement>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

fn default_viewport() -> Viewport {
    Viewport::new(1280.0, 720.0)
}

/// One emitted snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub at_ms: u64,
    pub snapshot: EngineSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub frames: Vec<Frame>,
    pub clipboard: Vec<String>,
    pub history: Vec<HistoryItem>,
}

/// Errors a replay can hit before or while running.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("step {index} goes back in time ({at_ms} ms < {previous_ms} ms)")]
    TimeWentBackwards { index: usize, at_ms: u64, previous_ms: u64 },
    #[error("step {index} has neither input nor command")]
    EmptyStep { index: usize },
    #[error("storage error: {0}")]
    Storage(#[from] pagegrab_core::GrabError),
}

/// Run `script`, optionally persisting history and toolbar placement in the
/// database directory `db_path`.
///
/// # Returns
/// Every distinct snapshot (after each step) plus the final clipboard writes
/// and history.
///
/// # Errors
/// Malformed step timing or a database that cannot be opened. Command
/// failures inside the script are logged and do not stop the replay.
pub fn run(script: &Script, db_path: Option<&str>) -> Result<ReplayOutcome, ReplayError> {
    validate(script)?;

    let tree = Arc::new(MemoryTree::from_elements(
        script.elements.iter().map(ScriptElement::to_memory_element),
    ));
    let clipboard = MemoryClipboard::new();
    let mut collaborators = Collaborators::in_memory(tree);
    collaborators.clipboard = Box::new(clipboard.clone());
    if let Some(path) = db_path {
        let (history_store, toolbar_store) = Database::new(path)?.into_stores();
        collaborators.history_store = Box::new(history_store);
        collaborators.toolbar_store = Box::new(toolbar_store);
    }

    let config = script.config.clone().unwrap_or_else(Config::from_env);
    let mut runtime = EngineRuntime::new(config, collaborators, script.viewport);
    let start = Instant::now();
    let mut frames: Vec<Frame> = Vec::new();
    info!(steps = script.steps.len(), elements = script.elements.len(), "replay started");

    for step in &script.steps {
        let now = start + Duration::from_millis(step.at_ms);
        runtime.tick(now);
        if let Some(event) = &step.input {
            runtime.handle_input(event.clone(), now);
        }
        if let Some(command) = &step.command {
            apply_command(&mut runtime, command, now);
        }
        runtime.tick(now);
        let snapshot = runtime.snapshot(now);
        if frames.last().map(|frame| &frame.snapshot) != Some(&snapshot) {
            frames.push(Frame {
                at_ms: step.at_ms,
                snapshot,
            });
        }
    }

    let end = start + Duration::from_millis(script.steps.last().map_or(0, |step| step.at_ms));
    runtime.dispose(end);
    Ok(ReplayOutcome {
        frames,
        clipboard: clipboard.writes(),
        history: runtime.history().to_vec(),
    })
}

fn validate(script: &Script) -> Result<(), ReplayError> {
    let mut previous_ms = 0;
    for (index, step) in script.steps.iter().enumerate() {
        if step.at_ms < previous_ms {
            return Err(ReplayError::TimeWentBackwards {
                index,
                at_ms: step.at_ms,
                previous_ms,
            });
        }
        if step.input.is_none() && step.command.is_none() {
            return Err(ReplayError::EmptyStep { index });
        }
        previous_ms = step.at_ms;
    }
    Ok(())
}

fn apply_command(runtime: &mut EngineRuntime, command: &ScriptCommand, now: Instant) {
    debug!(?command, "replay command");
    match command {
        ScriptCommand::Activate => runtime.activate(now),
        ScriptCommand::Deactivate => runtime.deactivate(now),
        ScriptCommand::Toggle => runtime.toggle(now),
        ScriptCommand::SetEnabled { enabled } => runtime.set_enabled(*enabled, now),
        ScriptCommand::CopyElements { ids } => {
            let ids: Vec<ElementId> = ids.iter().copied().map(ElementId).collect();
            if !runtime.copy_elements(&ids, now) {
                warn!(?ids, "copy did not run");
            }
        }
        ScriptCommand::EnterPrompt => {
            if !runtime.enter_prompt_mode(now) {
                warn!("prompt mode unavailable");
            }
        }
        ScriptCommand::SetPrompt { text } => runtime.set_prompt_input(text.as_str(), now),
        ScriptCommand::SubmitPrompt => {
            if let Err(err) = runtime.submit_prompt(now) {
                warn!(error = %err, "prompt submit failed");
            }
        }
        ScriptCommand::CancelPrompt => runtime.cancel_prompt(now),
        ScriptCommand::RunAction { id } => {
            if let Err(err) = runtime.run_action(id, now) {
                warn!(action = %id, error = %err, "action failed");
            }
        }
        ScriptCommand::NextAction => runtime.next_action(now),
        ScriptCommand::DismissContextMenu => runtime.dismiss_context_menu(now),
        ScriptCommand::ClearHistory => runtime.clear_history(now),
        ScriptCommand::Tick => {}
    }
}
