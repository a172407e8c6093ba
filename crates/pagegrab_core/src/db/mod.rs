//! Database layer for persisted history and toolbar placement.

/// History storage helpers.
pub mod history;
/// redb table definitions.
pub mod tables;
/// Toolbar placement storage helpers.
pub mod toolbar;

use crate::error::GrabError;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Database handle with access to the history and toolbar tables.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub history: history::HistoryDb,
    pub toolbar: toolbar::ToolbarDb,
}

impl Database {
    /// Open (or create) the database stored under directory `path`.
    ///
    /// # Returns
    /// A ready [`Database`] with all tables created.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created or redb fails to
    /// open/initialize the file.
    pub fn new(path: &str) -> Result<Self, GrabError> {
        let dir = Path::new(path);
        std::fs::create_dir_all(dir).map_err(|err| {
            GrabError::StorageMessage(format!(
                "Failed to create database directory '{}': {}",
                dir.display(),
                err
            ))
        })?;
        let file = dir.join(tables::REDB_FILE_NAME);
        let db = Arc::new(redb::Database::create(&file)?);
        info!("opened history database at {}", file.display());
        Self::from_shared(db)
    }

    /// Build a handle over an already-open redb database.
    ///
    /// # Errors
    /// Returns an error when table initialization fails.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, GrabError> {
        Ok(Self {
            history: history::HistoryDb::new(db.clone())?,
            toolbar: toolbar::ToolbarDb::new(db.clone())?,
            db,
        })
    }

    /// Split into independent history/toolbar handles for the engine stores.
    pub fn into_stores(self) -> (history::HistoryDb, toolbar::ToolbarDb) {
        (self.history, self.toolbar)
    }
}
