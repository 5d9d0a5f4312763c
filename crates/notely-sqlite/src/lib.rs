//! SQLite implementation of the notely key-value store.
//!
//! Slots live in a single two-column table, the same layout browsers use to
//! back local storage.

use log::{debug, error};
use notely_core::{Error, KeyValueStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)";

/// SQLite-backed key-value store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database at the given path, creating the slot table if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        debug!("event=store_open backend=sqlite path={}", path.display());
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Storage(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, Error> {
        conn.execute(CREATE_TABLE, [])
            .map_err(|e| Error::Storage(format!("Failed to create kv table: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("connection lock poisoned".to_string()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let conn = self.conn()?;

        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| Error::Storage(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| {
            error!("event=slot_write_failed backend=sqlite key={} error={}", key, e);
            Error::Storage(e.to_string())
        })?;

        Ok(())
    }
}
