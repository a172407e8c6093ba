//! Core domain library for pagegrab (geometry, host contract, models, storage).

/// Configuration loading and defaults.
pub mod config;
/// Shared default constants.
pub mod constants;
/// Database access layer for history and toolbar placement.
pub mod db;
/// Host element tree contract.
pub mod element;
/// Error types shared by the core and engine crates.
pub mod error;
/// Pure geometry and hit-testing helpers.
pub mod geometry;
/// In-memory host tree used by tests and scripted replays.
pub mod memory_tree;
/// Persisted data models.
pub mod models;
/// Persistence traits and in-memory stores.
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ActivationMode, Config};
pub use db::Database;
pub use element::{ElementGeometry, ElementId, ElementInfo, ElementTree};
pub use error::GrabError;
pub use geometry::{OverlayBounds, Point, Rect, Size, Transform, Viewport};
pub use memory_tree::{MemoryElement, MemoryTree};
pub use models::{
    history::HistoryItem,
    toolbar::{Edge, ToolbarState},
};
pub use store::{HistoryStore, MemoryHistoryStore, MemoryToolbarStore, ToolbarStore};
