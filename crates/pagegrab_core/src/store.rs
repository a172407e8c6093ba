//! Persistence traits for history and toolbar placement, plus in-memory stores.
//!
//! The engine keeps the authoritative in-memory copy; stores only mirror it.

use crate::error::GrabError;
use crate::models::{history::HistoryItem, toolbar::ToolbarState};

/// History list persistence.
pub trait HistoryStore: Send {
    /// All persisted items, newest first.
    fn load(&self) -> Result<Vec<HistoryItem>, GrabError>;
    fn add(&mut self, item: &HistoryItem) -> Result<(), GrabError>;
    /// Returns whether an item with `id` existed.
    fn remove(&mut self, id: &str) -> Result<bool, GrabError>;
    fn clear(&mut self) -> Result<(), GrabError>;
}

/// Toolbar placement persistence.
pub trait ToolbarStore: Send {
    fn load(&self) -> Result<Option<ToolbarState>, GrabError>;
    fn save(&mut self, state: &ToolbarState) -> Result<(), GrabError>;
}

/// Process-local history store.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistoryStore {
    items: Vec<HistoryItem>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<HistoryItem>) -> Self {
        Self { items }
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<Vec<HistoryItem>, GrabError> {
        Ok(self.items.clone())
    }

    fn add(&mut self, item: &HistoryItem) -> Result<(), GrabError> {
        self.items.retain(|existing| existing.id != item.id);
        self.items.insert(0, item.clone());
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<bool, GrabError> {
        let before = self.items.len();
        self.items.retain(|existing| existing.id != id);
        Ok(self.items.len() != before)
    }

    fn clear(&mut self) -> Result<(), GrabError> {
        self.items.clear();
        Ok(())
    }
}

/// Process-local toolbar store.
#[derive(Debug, Default, Clone)]
pub struct MemoryToolbarStore {
    state: Option<ToolbarState>,
}

impl MemoryToolbarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ToolbarState) -> Self {
        Self { state: Some(state) }
    }
}

impl ToolbarStore for MemoryToolbarStore {
    fn load(&self) -> Result<Option<ToolbarState>, GrabError> {
        Ok(self.state)
    }

    fn save(&mut self, state: &ToolbarState) -> Result<(), GrabError> {
        self.state = Some(*state);
        Ok(())
    }
}
