//! Error types for core storage and engine collaborators.
use thiserror::Error;

/// Top-level error type shared by the core and engine crates.
#[derive(Error, Debug)]
pub enum GrabError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Snippet generation failed: {0}")]
    Snippet(String),

    #[error("Agent provider error: {0}")]
    Provider(String),

    #[error("Plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl GrabError {
    /// Builds a plugin failure for `plugin`.
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl From<redb::DatabaseError> for GrabError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for GrabError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for GrabError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for GrabError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for GrabError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}
