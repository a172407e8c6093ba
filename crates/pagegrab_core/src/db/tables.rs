//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured directory.
pub const REDB_FILE_NAME: &str = "pagegrab.redb";

/// Canonical history rows (`HistoryItem`, bincode-encoded).
pub const HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("history");

/// Recency index ordered by reverse-millis then id.
pub const HISTORY_BY_TIME: TableDefinition<(u64, &str), ()> =
    TableDefinition::new("history_by_time");

/// Single-row toolbar placement table.
pub const TOOLBAR: TableDefinition<&str, &[u8]> = TableDefinition::new("toolbar");

/// Key of the toolbar placement row.
pub const TOOLBAR_KEY: &str = "placement";
