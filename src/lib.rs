//! Root crate facade for pagegrab: re-exports the core and engine crates and
//! hosts the scripted replay driver used by the CLI.

/// Scripted headless sessions (JSON in, snapshots out).
pub mod replay;

pub use pagegrab_core::{
    config, db, error, geometry, models, ActivationMode, Config, Database, ElementId, ElementInfo,
    ElementTree, GrabError, HistoryItem, MemoryElement, MemoryTree, ToolbarState, Viewport,
};
pub use pagegrab_engine::{
    Collaborators, EngineRuntime, EngineSnapshot, InputEvent, MemoryClipboard, Plugin,
};
