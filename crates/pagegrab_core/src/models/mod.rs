//! Persisted data models.

/// History rows produced by the copy pipeline.
pub mod history;
/// Toolbar placement state.
pub mod toolbar;
