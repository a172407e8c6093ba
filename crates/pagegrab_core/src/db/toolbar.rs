//! Toolbar placement storage backed by redb.

use crate::db::tables::{TOOLBAR, TOOLBAR_KEY};
use crate::error::GrabError;
use crate::models::toolbar::ToolbarState;
use crate::store::ToolbarStore;
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Accessor for the single-row toolbar table.
pub struct ToolbarDb {
    db: Arc<redb::Database>,
}

impl ToolbarDb {
    /// Initialize the toolbar table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, GrabError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TOOLBAR)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Load the stored placement, normalized.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn get(&self) -> Result<Option<ToolbarState>, GrabError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TOOLBAR)?;
        match table.get(TOOLBAR_KEY)? {
            Some(value) => {
                let state: ToolbarState = bincode::deserialize(value.value())?;
                Ok(Some(state.normalized()))
            }
            None => Ok(None),
        }
    }

    /// Persist the placement.
    ///
    /// # Errors
    /// Returns an error when serialization or storage operations fail.
    pub fn put(&self, state: &ToolbarState) -> Result<(), GrabError> {
        let encoded = bincode::serialize(&state.normalized())?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TOOLBAR)?;
            table.insert(TOOLBAR_KEY, encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl ToolbarStore for ToolbarDb {
    fn load(&self) -> Result<Option<ToolbarState>, GrabError> {
        self.get()
    }

    fn save(&mut self, state: &ToolbarState) -> Result<(), GrabError> {
        self.put(state)
    }
}
