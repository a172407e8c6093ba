//! History rows produced by the copy pipeline.

use crate::element::ElementInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One copied selection, newest first in every list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub content: String,
    pub element_name: String,
    pub tag_name: String,
    pub component_name: Option<String>,
    pub elements_count: usize,
    pub element_selectors: Vec<String>,
    pub is_comment: bool,
    pub comment_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Whether an item is a plain copy or a copy carrying a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryKind<'a> {
    Copy,
    Comment(&'a str),
}

impl HistoryItem {
    /// Builds a history row for `elements` (first element names the row).
    ///
    /// A blank comment is treated as no comment.
    pub fn new(content: String, elements: &[ElementInfo], comment: Option<String>) -> Self {
        let comment_text = comment.filter(|text| !text.trim().is_empty());
        let first = elements.first();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            element_name: first
                .map(|info| info.display_name().to_string())
                .unwrap_or_else(|| "element".to_string()),
            tag_name: first
                .map(|info| info.tag_name.clone())
                .unwrap_or_default(),
            component_name: first.and_then(|info| info.component_name.clone()),
            elements_count: elements.len(),
            element_selectors: elements.iter().map(|info| info.selector.clone()).collect(),
            is_comment: comment_text.is_some(),
            comment_text,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> HistoryKind<'_> {
        match (self.is_comment, self.comment_text.as_deref()) {
            (true, Some(text)) => HistoryKind::Comment(text),
            (true, None) => HistoryKind::Comment(""),
            (false, _) => HistoryKind::Copy,
        }
    }

    /// Same selection (order-insensitive) and same kind.
    pub fn is_duplicate_of(&self, other: &HistoryItem) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        let mut mine: Vec<&str> = self.element_selectors.iter().map(String::as_str).collect();
        let mut theirs: Vec<&str> = other.element_selectors.iter().map(String::as_str).collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}
