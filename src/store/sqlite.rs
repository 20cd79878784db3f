//! SQLite Store
//!
//! Persists entries in a single `cache` table. Every [`Store`] operation is
//! one cached prepared statement, so each is atomic at the SQLite level.
//!
//! Recency is `(last_access_at, access_seq)`: the millisecond clock first,
//! then a per-store counter bumped on every write and successful read, so
//! accesses within the same millisecond still have a strict order.

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{Store, StoreError, StoreResult, StoredValue};
use crate::config::Database;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache (
        key            TEXT PRIMARY KEY,
        value          BLOB NOT NULL,
        expires_at     INTEGER,
        last_access_at INTEGER NOT NULL,
        compressed     INTEGER NOT NULL DEFAULT 0,
        access_seq     INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache (expires_at);
";

// Tables created before access_seq existed lack the column
const HAS_ACCESS_SEQ: &str =
    "SELECT COUNT(*) FROM pragma_table_info('cache') WHERE name = 'access_seq'";

const ADD_ACCESS_SEQ: &str =
    "ALTER TABLE cache ADD COLUMN access_seq INTEGER NOT NULL DEFAULT 0";

const RECENCY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_cache_recency ON cache (last_access_at, access_seq)";

const MAX_ACCESS_SEQ: &str = "SELECT COALESCE(MAX(access_seq), 0) FROM cache";

const TOUCH_AND_FETCH: &str = "
    UPDATE cache
       SET last_access_at = MAX(last_access_at, ?2),
           access_seq = ?3
     WHERE key = ?1
       AND (expires_at IS NULL OR expires_at > ?2)
    RETURNING value, compressed";

const UPSERT: &str = "
    INSERT INTO cache (key, value, expires_at, last_access_at, compressed, access_seq)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        expires_at = excluded.expires_at,
        last_access_at = excluded.last_access_at,
        compressed = excluded.compressed,
        access_seq = excluded.access_seq";

const DELETE_KEY: &str = "DELETE FROM cache WHERE key = ?1";

const DELETE_ALL: &str = "DELETE FROM cache";

const DELETE_EXPIRED: &str =
    "DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at < ?1";

const DELETE_EXCESS: &str = "
    DELETE FROM cache
     WHERE key NOT IN (
        SELECT key FROM cache
         ORDER BY last_access_at DESC, access_seq DESC
         LIMIT ?1
     )";

const COUNT: &str = "SELECT COUNT(*) FROM cache";

// == SQLite Store ==
/// [`Store`] backed by a SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    /// None once closed
    conn: Mutex<Option<Connection>>,
    /// Last access sequence handed out
    access_seq: AtomicI64,
}

impl SqliteStore {
    // == Constructor ==
    /// Opens (or creates) the database and ensures the schema exists.
    ///
    /// File databases run in WAL mode so readers are not locked out while
    /// a sweep deletes rows.
    pub fn open(database: &Database) -> StoreResult<Self> {
        let conn = match database {
            Database::Memory => Connection::open_in_memory()?,
            Database::File(path) => {
                let conn = Connection::open(path)?;
                let mode: String = conn.pragma_update_and_check(
                    None,
                    "journal_mode",
                    "WAL",
                    |row| row.get(0),
                )?;
                debug!("Opened {} with journal_mode={}", path.display(), mode);
                conn
            }
        };

        conn.execute_batch(SCHEMA)?;
        let has_seq: i64 = conn.query_row(HAS_ACCESS_SEQ, [], |row| row.get(0))?;
        if has_seq == 0 {
            debug!("Adding access_seq column to existing cache table");
            conn.execute(ADD_ACCESS_SEQ, [])?;
        }
        conn.execute(RECENCY_INDEX, [])?;
        let last_seq: i64 = conn.query_row(MAX_ACCESS_SEQ, [], |row| row.get(0))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            access_seq: AtomicI64::new(last_seq),
        })
    }

    /// Shorthand for a private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(&Database::Memory)
    }

    fn with_conn<R>(
        &self,
        op: impl FnOnce(&Connection) -> rusqlite::Result<R>,
    ) -> StoreResult<R> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(op(conn)?)
    }

    /// Next access sequence. Callers hold the connection lock, so sequence
    /// order matches statement order.
    fn next_seq(&self) -> i64 {
        self.access_seq.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Store for SqliteStore {
    fn touch_and_fetch(&self, key: &str, now: i64) -> StoreResult<Option<StoredValue>> {
        self.with_conn(|conn| {
            conn.prepare_cached(TOUCH_AND_FETCH)?
                .query_row(params![key, now, self.next_seq()], |row| {
                    Ok(StoredValue {
                        bytes: row.get(0)?,
                        compressed: row.get(1)?,
                    })
                })
                .optional()
        })
    }

    fn upsert(
        &self,
        key: &str,
        value: StoredValue,
        expires_at: Option<i64>,
        now: i64,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(UPSERT)?.execute(params![
                key,
                value.bytes,
                expires_at,
                now,
                value.compressed,
                self.next_seq()
            ])?;
            Ok(())
        })
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(DELETE_KEY)?.execute(params![key])?;
            Ok(())
        })
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.prepare_cached(DELETE_ALL)?.execute([])?;
            Ok(())
        })
    }

    fn delete_expired(&self, now: i64) -> StoreResult<usize> {
        self.with_conn(|conn| conn.prepare_cached(DELETE_EXPIRED)?.execute(params![now]))
    }

    fn delete_excess_by_recency(&self, max_items: usize) -> StoreResult<usize> {
        let limit = i64::try_from(max_items).unwrap_or(i64::MAX);
        self.with_conn(|conn| conn.prepare_cached(DELETE_EXCESS)?.execute(params![limit]))
    }

    fn len(&self) -> StoreResult<usize> {
        let count: i64 = self.with_conn(|conn| {
            conn.prepare_cached(COUNT)?.query_row([], |row| row.get(0))
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn close(&self) -> StoreResult<()> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => conn.close().map_err(|(_, err)| StoreError::Sqlite(err)),
            None => Ok(()),
        }
    }
}
