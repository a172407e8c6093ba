//! Keyboard cycling through the actions available for the current target.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionCycleState {
    pub items: Vec<String>,
    pub active_index: Option<usize>,
    pub is_visible: bool,
}

impl ActionCycleState {
    /// Step to the next action. A changed action list restarts at the first
    /// item.
    pub fn advance(&mut self, available: Vec<String>) {
        if available.is_empty() {
            self.reset();
            return;
        }
        self.active_index = match self.active_index {
            Some(index) if self.is_visible && self.items == available => Some((index + 1) % available.len()),
            _ => Some(0),
        };
        self.items = available;
        self.is_visible = true;
    }

    pub fn active(&self) -> Option<&str> {
        let index = self.active_index?;
        self.items.get(index).map(String::as_str)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn advance_wraps_around() {
        let mut cycle = ActionCycleState::default();
        cycle.advance(ids(&["copy", "comment"]));
        assert_eq!(cycle.active(), Some("copy"));
        cycle.advance(ids(&["copy", "comment"]));
        assert_eq!(cycle.active(), Some("comment"));
        cycle.advance(ids(&["copy", "comment"]));
        assert_eq!(cycle.active(), Some("copy"));
        assert!(cycle.is_visible);
    }

    #[test]
    fn changed_list_restarts_and_empty_list_hides() {
        let mut cycle = ActionCycleState::default();
        cycle.advance(ids(&["copy", "comment"]));
        cycle.advance(ids(&["copy", "comment"]));
        cycle.advance(ids(&["copy", "open"]));
        assert_eq!(cycle.active(), Some("copy"));
        cycle.advance(Vec::new());
        assert!(!cycle.is_visible);
        assert_eq!(cycle.active(), None);
    }
}
