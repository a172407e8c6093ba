//! Copy pipeline: element interception, snippet generation, transforms and
//! the clipboard write.

use crate::plugin::PluginRegistry;
use pagegrab_core::{ElementInfo, GrabError};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Builds the text copied for a set of elements.
pub trait SnippetGenerator: Send + Sync {
    fn generate(&self, elements: &[ElementInfo], extra_prompt: Option<&str>) -> Result<String, GrabError>;
}

/// Host clipboard.
pub trait Clipboard: Send {
    fn write_text(&mut self, text: &str) -> Result<(), GrabError>;
}

/// Plain-text snippet: one block per element with its name, selector and
/// visible text, preceded by the comment when there is one.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSnippetGenerator;

impl SnippetGenerator for PlainSnippetGenerator {
    fn generate(&self, elements: &[ElementInfo], extra_prompt: Option<&str>) -> Result<String, GrabError> {
        if elements.is_empty() {
            return Err(GrabError::Snippet("no elements to describe".to_string()));
        }
        let mut blocks = Vec::with_capacity(elements.len() + 1);
        if let Some(prompt) = extra_prompt.map(str::trim).filter(|prompt| !prompt.is_empty()) {
            blocks.push(prompt.to_string());
        }
        for element in elements {
            let mut block = match &element.component_name {
                Some(component) => format!("<{}> in {}", element.tag_name, component),
                None => format!("<{}>", element.tag_name),
            };
            block.push_str(&format!("\n  selector: {}", element.selector));
            if let Some(text) = element.text_preview.as_deref().filter(|text| !text.is_empty()) {
                block.push_str(&format!("\n  text: {:?}", text));
            }
            blocks.push(block);
        }
        Ok(blocks.join("\n\n"))
    }
}

/// In-memory clipboard. Clones share the same buffer, so a test can keep a
/// handle after giving one to the runtime.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    writes: Arc<Mutex<Vec<String>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with `message` (or succeed again with `None`).
    pub fn set_failure(&self, message: Option<&str>) {
        *self.fail_with.lock().unwrap_or_else(PoisonError::into_inner) = message.map(str::to_string);
    }

    pub fn last(&self) -> Option<String> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), GrabError> {
        if let Some(message) = self
            .fail_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(GrabError::Clipboard(message));
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}

/// Result of a successful copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Text written to the clipboard (empty when plugins handled every
    /// element without contributing text).
    pub content: String,
    /// Plugins that intercepted an element.
    pub intercepted_by: Vec<String>,
    pub wrote_clipboard: bool,
}

/// Copy `elements`.
///
/// Each element is first offered to the element-select hooks. Elements no
/// plugin claims go through the snippet generator and the copy transforms.
/// Plugin-contributed text is appended after the generated snippet, or
/// after the comment alone when plugins claimed every element.
///
/// # Errors
/// Fails if an intercepting plugin fails, snippet generation fails or the
/// clipboard write fails.
pub fn perform_copy(
    registry: &PluginRegistry,
    snippets: &dyn SnippetGenerator,
    clipboard: &mut dyn Clipboard,
    elements: &[ElementInfo],
    extra_prompt: Option<&str>,
) -> Result<CopyOutcome, GrabError> {
    let mut unclaimed = Vec::with_capacity(elements.len());
    let mut contributed = Vec::new();
    let mut intercepted_by = Vec::new();
    for element in elements {
        match registry.intercept_element(element) {
            Some(interception) => {
                intercepted_by.push(interception.plugin.clone());
                match interception.result {
                    Ok(Some(text)) => contributed.push(text),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(
                            target: "pagegrab_engine::copy",
                            plugin = %interception.plugin,
                            error = %err,
                            "intercepted copy failed"
                        );
                        return Err(err);
                    }
                }
            }
            None => unclaimed.push(element.clone()),
        }
    }

    let mut parts = Vec::new();
    if !unclaimed.is_empty() {
        let generated = snippets.generate(&unclaimed, extra_prompt)?;
        parts.push(registry.transform_copy(generated, &unclaimed));
    } else if let Some(comment) = extra_prompt.map(str::trim).filter(|comment| !comment.is_empty()) {
        // The generator normally leads with the comment; keep it when it never ran.
        parts.push(comment.to_string());
    }
    parts.extend(contributed);

    let content = parts.join("\n\n");
    let wrote_clipboard = !content.is_empty();
    if wrote_clipboard {
        clipboard.write_text(&content)?;
    }
    info!(
        target: "pagegrab_engine::copy",
        elements = elements.len(),
        intercepted = intercepted_by.len(),
        bytes = content.len(),
        "copy completed"
    );
    Ok(CopyOutcome {
        content,
        intercepted_by,
        wrote_clipboard,
    })
}
