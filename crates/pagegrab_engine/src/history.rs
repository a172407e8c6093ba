//! Copy history: the in-memory list is authoritative, the store mirrors it.

use crate::timers::{Scheduler, TimerKind};
use pagegrab_core::models::history::HistoryItem;
use pagegrab_core::HistoryStore;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct HistoryBook {
    items: Vec<HistoryItem>,
    store: Box<dyn HistoryStore>,
    limit: usize,
    flash: Duration,
    has_unread: bool,
    flashing: bool,
}

impl HistoryBook {
    /// Load persisted history. A failing store starts empty.
    pub fn new(store: Box<dyn HistoryStore>, limit: usize, flash: Duration) -> Self {
        let mut items = match store.load() {
            Ok(items) => items,
            Err(err) => {
                warn!(target: "pagegrab_engine::history", error = %err, "failed to load history");
                Vec::new()
            }
        };
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(limit.max(1));
        Self {
            items,
            store,
            limit: limit.max(1),
            flash,
            has_unread: false,
            flashing: false,
        }
    }

    /// Newest first.
    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn has_unread(&self) -> bool {
        self.has_unread
    }

    pub fn is_flashing(&self) -> bool {
        self.flashing
    }

    /// Add a copy result. Any entry with the same selection and kind is
    /// replaced, the new row goes first and the list is capped.
    pub fn record(&mut self, item: HistoryItem, now: Instant, scheduler: &mut Scheduler) {
        let duplicates: Vec<String> = self
            .items
            .iter()
            .filter(|existing| existing.is_duplicate_of(&item))
            .map(|existing| existing.id.clone())
            .collect();
        for id in &duplicates {
            self.remove_persisted(id);
        }
        self.items.retain(|existing| !duplicates.contains(&existing.id));

        if let Err(err) = self.store.add(&item) {
            warn!(target: "pagegrab_engine::history", error = %err, "failed to persist history item");
        }
        debug!(target: "pagegrab_engine::history", id = %item.id, replaced = duplicates.len(), "history recorded");
        self.items.insert(0, item);

        while self.items.len() > self.limit {
            if let Some(oldest) = self.items.pop() {
                self.remove_persisted(&oldest.id);
            }
        }

        self.has_unread = true;
        self.flashing = true;
        scheduler.restart(TimerKind::HistoryFlash, now, self.flash);
    }

    fn remove_persisted(&mut self, id: &str) {
        if let Err(err) = self.store.remove(id) {
            warn!(target: "pagegrab_engine::history", id, error = %err, "failed to remove history item");
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.remove_persisted(id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.has_unread = false;
        if let Err(err) = self.store.clear() {
            warn!(target: "pagegrab_engine::history", error = %err, "failed to clear history");
        }
    }

    pub fn mark_read(&mut self) {
        self.has_unread = false;
    }

    pub fn on_flash_elapsed(&mut self) {
        self.flashing = false;
    }
}
