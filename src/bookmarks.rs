// 🔖 Bookmark Store - saved school ids in a SQLite key/value table
//
// The whole set lives as one JSON array under BOOKMARKS_KEY.
// Reads and writes never surface errors to the caller: a failed load is an
// empty set, a failed save is a logged no-op.

use crate::error::{FinderError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

pub const BOOKMARKS_KEY: &str = "school_finder_bookmarks";

pub fn setup_store(conn: &Connection) -> Result<()> {
    // In-memory databases silently ignore WAL; that is fine
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub struct BookmarkStore {
    conn: Connection,
}

impl BookmarkStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_store(&conn)?;
        Ok(BookmarkStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_store(&conn)?;
        Ok(BookmarkStore { conn })
    }

    // ========================================================================
    // RAW KEY/VALUE
    // ========================================================================

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ========================================================================
    // BOOKMARK SET
    // ========================================================================

    /// Saved ids; empty on any read or decode failure
    pub fn load(&self) -> BTreeSet<String> {
        let raw = match self.get_value(BOOKMARKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read bookmarks");
                return BTreeSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Stored bookmarks are not a JSON list of ids, ignoring them");
                BTreeSet::new()
            }
        }
    }

    /// Replace the saved set. Returns false (after logging) if nothing was written.
    pub fn save(&self, ids: &BTreeSet<String>) -> bool {
        let result = serde_json::to_string(ids)
            .map_err(FinderError::from)
            .and_then(|json| self.set_value(BOOKMARKS_KEY, &json));

        match result {
            Ok(()) => {
                debug!(count = ids.len(), "Bookmarks saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save bookmarks");
                false
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load().contains(id)
    }

    pub fn add(&self, id: &str) -> BTreeSet<String> {
        let mut ids = self.load();
        if ids.insert(id.to_string()) {
            self.save(&ids);
        }
        ids
    }

    pub fn remove(&self, id: &str) -> BTreeSet<String> {
        let mut ids = self.load();
        if ids.remove(id) {
            self.save(&ids);
        }
        ids
    }

    /// Returns whether `id` is bookmarked afterwards
    pub fn toggle(&self, id: &str) -> bool {
        let mut ids = self.load();
        let bookmarked = if ids.remove(id) {
            false
        } else {
            ids.insert(id.to_string());
            true
        };
        self.save(&ids);
        bookmarked
    }
}
