//! Overlay engine for pagegrab: activation, selection, copy/history, agent
//! sessions, plugins and toolbar placement, tied together by
//! [`EngineRuntime`].

/// Keyboard cycling through available actions.
pub mod action_cycle;
/// Activation state machine.
pub mod activation;
/// Agent session manager and provider contract.
pub mod agent;
/// Copy pipeline and clipboard/snippet collaborators.
pub mod copy;
/// Copy history with de-duplication and persistence.
pub mod history;
/// Host input events.
pub mod input;
/// Versioned source and component-name lookups.
pub mod lookup;
/// Toolbar edge snapping and anchored panels.
pub mod placement;
/// Plugin registry, hooks and actions.
pub mod plugin;
/// The engine runtime.
pub mod runtime;
/// Hovered target, drag marquee and copy feedback.
pub mod selection;
/// Read-only state snapshot.
pub mod snapshot;
/// Cancellable scheduled tasks.
pub mod timers;

pub use activation::{ActivationState, ActivePhase, DeactivationReason, Direction};
pub use agent::protocol::{AgentContext, AgentProvider, AgentSession, Capabilities, SessionPhase};
pub use copy::{Clipboard, MemoryClipboard, PlainSnippetGenerator, SnippetGenerator};
pub use input::{InputEvent, Key, KeyEvent, Modifiers, PointerButton, PointerEvent};
pub use lookup::{SourceLocation, SourceLocator};
pub use plugin::{Plugin, PluginRegistry, Theme, ThemeOverrides};
pub use runtime::{Collaborators, EngineRuntime, SubscriptionId};
pub use snapshot::EngineSnapshot;
