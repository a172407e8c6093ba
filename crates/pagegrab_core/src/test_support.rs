//! Shared test-only helpers for pagegrab_core.

use crate::element::{ElementId, ElementInfo};
use crate::Database;
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation, path conversion, or database initialization
/// fails in the test environment.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// Minimal element description for model/storage tests.
pub(crate) fn element_info(id: u64, tag: &str) -> ElementInfo {
    ElementInfo {
        id: ElementId(id),
        tag_name: tag.to_string(),
        component_name: None,
        selector: format!("{}:nth-of-type({})", tag, id),
        text_preview: None,
    }
}
