//! Device-local persistence for the auth ledger.
//!
//! A single key/value table backed by SQLite. The ledger reads and writes
//! flat string keys (record list, group list, cached backup identifier)
//! whose values are JSON strings; this layer never inspects them.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Well-known keys
// ============================================================================

/// Key holding the JSON-encoded record list.
pub const AUTH_CODES_KEY: &str = "authCodes";
/// Key holding the JSON-encoded group list.
pub const GROUPS_KEY: &str = "groups";
/// Key holding the backup identifier of the last passphrase backup.
pub const CACHED_BACKUP_ID_KEY: &str = "lastBackupId";

// ============================================================================
// DeviceStore
// ============================================================================

/// String key/value store backed by SQLite.
#[derive(Clone)]
pub struct DeviceStore {
    conn: Arc<Mutex<Connection>>,
}

impl DeviceStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Inserts or replaces the value under `key`.
    pub fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Writes several keys in a single transaction.
    ///
    /// Used where two keys must move together, e.g. the record and group
    /// lists after a group removal reassigns members.
    pub fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes `key` if present.
    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])?;
        Ok(())
    }
}

// -- Schema --

fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}
