//! SQLite-backed status store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{ItemStatus, StatusError, StatusStore, WorkItem};

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Raw row as stored, before status and timestamp validation.
type RawRow = (String, String, String, String, Option<String>);

/// SQLite-backed status store.
///
/// A file-backed store is opened in WAL mode so the controller and worker
/// processes can share it.
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    /// Open (or create) the status database at `path`.
    pub fn new(path: &Path) -> Result<Self, StatusError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StatusError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StatusError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS work_items (
                group_key TEXT NOT NULL,
                item_key TEXT NOT NULL,
                status TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                error_message TEXT,
                PRIMARY KEY (group_key, item_key)
            );

            CREATE INDEX IF NOT EXISTS idx_work_items_status ON work_items(group_key, status);
            "#,
        )?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StatusError> {
        self.conn
            .lock()
            .map_err(|_| StatusError::Database("connection lock poisoned".to_string()))
    }

    fn read_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    /// Validate a raw row. Unknown status strings are rejected here rather
    /// than handed to callers.
    fn into_item(raw: RawRow) -> Result<WorkItem, StatusError> {
        let (group, item, status, last_updated, error_message) = raw;

        let status = status
            .parse::<ItemStatus>()
            .map_err(|e| StatusError::UnknownStatus {
                group: group.clone(),
                item: item.clone(),
                value: e.0,
            })?;

        let last_updated = DateTime::parse_from_rfc3339(&last_updated)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StatusError::InvalidTimestamp {
                group: group.clone(),
                item: item.clone(),
                value: last_updated.clone(),
            })?;

        Ok(WorkItem {
            group,
            item,
            status,
            last_updated,
            error_message,
        })
    }

    fn timestamp(now: DateTime<Utc>) -> String {
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl StatusStore for SqliteStatusStore {
    fn items_by_group(&self, group: &str) -> Result<Vec<WorkItem>, StatusError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT group_key, item_key, status, last_updated, error_message FROM work_items WHERE group_key = ? ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![group], Self::read_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(Self::into_item(row?)?);
        }
        Ok(items)
    }

    fn get(&self, group: &str, item: &str) -> Result<Option<WorkItem>, StatusError> {
        let conn = self.conn()?;

        let raw = conn
            .query_row(
                "SELECT group_key, item_key, status, last_updated, error_message FROM work_items WHERE group_key = ? AND item_key = ?",
                params![group, item],
                Self::read_row,
            )
            .optional()?;

        raw.map(Self::into_item).transpose()
    }

    fn set_status(
        &self,
        group: &str,
        item: &str,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> Result<(), StatusError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO work_items (group_key, item_key, status, last_updated, error_message)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (group_key, item_key) DO UPDATE SET
                status = excluded.status,
                last_updated = excluded.last_updated,
                error_message = COALESCE(excluded.error_message, work_items.error_message)
            "#,
            params![
                group,
                item,
                status.as_str(),
                Self::timestamp(Utc::now()),
                error_message
            ],
        )?;

        Ok(())
    }

    fn seed_items(&self, group: &str, items: &[String]) -> Result<usize, StatusError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Self::timestamp(Utc::now());

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO work_items (group_key, item_key, status, last_updated) VALUES (?, ?, ?, ?)",
            )?;
            for item in items {
                inserted += stmt.execute(params![group, item, ItemStatus::Pending.as_str(), now])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }
}
