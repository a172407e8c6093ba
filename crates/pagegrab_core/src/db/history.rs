//! History storage operations backed by redb.

use crate::db::tables::{HISTORY, HISTORY_BY_TIME};
use crate::error::GrabError;
use crate::models::history::HistoryItem;
use crate::store::HistoryStore;
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Reverse-millis key so ascending iteration yields newest rows first.
pub(crate) fn reverse_timestamp_key(timestamp: DateTime<Utc>) -> u64 {
    let millis = timestamp.timestamp_millis().max(0) as u64;
    u64::MAX - millis
}

fn deserialize_item(bytes: &[u8]) -> Result<HistoryItem, GrabError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Accessor for history tables.
pub struct HistoryDb {
    db: Arc<redb::Database>,
}

impl HistoryDb {
    /// Initialize history tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, GrabError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(HISTORY)?;
        write_txn.open_table(HISTORY_BY_TIME)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert or replace a history row and its recency index entry.
    ///
    /// # Errors
    /// Returns an error when serialization or storage operations fail.
    pub fn upsert(&self, item: &HistoryItem) -> Result<(), GrabError> {
        let encoded = bincode::serialize(item)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(HISTORY)?;
            let mut by_time = write_txn.open_table(HISTORY_BY_TIME)?;

            let previous = rows
                .get(item.id.as_str())?
                .map(|guard| deserialize_item(guard.value()))
                .transpose()?;
            if let Some(previous) = previous {
                by_time.remove((reverse_timestamp_key(previous.timestamp), item.id.as_str()))?;
            }

            rows.insert(item.id.as_str(), encoded.as_slice())?;
            by_time.insert((reverse_timestamp_key(item.timestamp), item.id.as_str()), ())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a row by id.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn get(&self, id: &str) -> Result<Option<HistoryItem>, GrabError> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(HISTORY)?;
        match rows.get(id)? {
            Some(value) => Ok(Some(deserialize_item(value.value())?)),
            None => Ok(None),
        }
    }

    /// List rows newest first, capped by `limit`.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn list(&self, limit: usize) -> Result<Vec<HistoryItem>, GrabError> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(HISTORY)?;
        let by_time = read_txn.open_table(HISTORY_BY_TIME)?;
        let mut items = Vec::new();
        for entry in by_time.iter()? {
            if items.len() >= limit {
                break;
            }
            let (key, _) = entry?;
            let (_, id) = key.value();
            if let Some(value) = rows.get(id)? {
                items.push(deserialize_item(value.value())?);
            }
        }
        Ok(items)
    }

    /// Delete a row by id.
    ///
    /// # Returns
    /// `true` when a row was deleted.
    ///
    /// # Errors
    /// Returns an error when storage operations fail.
    pub fn delete(&self, id: &str) -> Result<bool, GrabError> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut rows = write_txn.open_table(HISTORY)?;
            let mut by_time = write_txn.open_table(HISTORY_BY_TIME)?;
            let removed = rows
                .remove(id)?
                .map(|guard| deserialize_item(guard.value()))
                .transpose()?;
            match removed {
                Some(item) => {
                    by_time.remove((reverse_timestamp_key(item.timestamp), id))?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Remove every row.
    ///
    /// # Errors
    /// Returns an error when storage operations fail.
    pub fn clear(&self) -> Result<(), GrabError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(HISTORY)?;
            let mut by_time = write_txn.open_table(HISTORY_BY_TIME)?;
            let ids: Vec<String> = rows
                .iter()?
                .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                .collect::<Result<_, _>>()?;
            let index_keys: Vec<(u64, String)> = by_time
                .iter()?
                .map(|entry| {
                    entry.map(|(key, _)| {
                        let (millis, id) = key.value();
                        (millis, id.to_string())
                    })
                })
                .collect::<Result<_, _>>()?;
            for id in &ids {
                rows.remove(id.as_str())?;
            }
            for (millis, id) in &index_keys {
                by_time.remove((*millis, id.as_str()))?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Drop the oldest rows beyond `limit`.
    ///
    /// # Returns
    /// Number of rows removed.
    ///
    /// # Errors
    /// Returns an error when storage operations fail.
    pub fn trim(&self, limit: usize) -> Result<usize, GrabError> {
        let stale: Vec<String> = {
            let read_txn = self.db.begin_read()?;
            let by_time = read_txn.open_table(HISTORY_BY_TIME)?;
            by_time
                .iter()?
                .skip(limit)
                .map(|entry| entry.map(|(key, _)| key.value().1.to_string()))
                .collect::<Result<_, _>>()?
        };
        let mut removed = 0;
        for id in stale {
            if self.delete(&id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl HistoryStore for HistoryDb {
    fn load(&self) -> Result<Vec<HistoryItem>, GrabError> {
        self.list(usize::MAX)
    }

    fn add(&mut self, item: &HistoryItem) -> Result<(), GrabError> {
        self.upsert(item)
    }

    fn remove(&mut self, id: &str) -> Result<bool, GrabError> {
        self.delete(id)
    }

    fn clear(&mut self) -> Result<(), GrabError> {
        HistoryDb::clear(self)
    }
}
