//! Audit entry persistence.

use crate::{AuditEntry, Error, Result};
use chrono::DateTime;
use rusqlite::{Connection, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable, insert-only storage for audit entries.
///
/// Every list query returns entries newest first, entries sharing a timestamp
/// in the order they were appended, and at most `limit` of them.
pub trait AuditStore: Send + Sync {
    fn append(&self, entry: &AuditEntry) -> Result<()>;

    fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<AuditEntry>>;

    fn list_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>>;

    fn list_recent(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    fn count(&self) -> Result<usize>;
}

/// SQLite-backed audit store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const COLUMNS: &str =
    "id, action, user_id, ip_address, resource_type, resource_id, metadata, inserted_at";

impl SqliteStore {
    /// Open or create an audit store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Create an in-memory audit store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                action TEXT NOT NULL,
                user_id INTEGER,
                ip_address TEXT,
                resource_type TEXT,
                resource_id TEXT,
                metadata TEXT NOT NULL,
                inserted_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_user
                ON audit_log(user_id, inserted_at);
            CREATE INDEX IF NOT EXISTS idx_audit_resource
                ON audit_log(resource_type, resource_id, inserted_at);
            CREATE INDEX IF NOT EXISTS idx_audit_inserted
                ON audit_log(inserted_at);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }

    fn query(&self, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM audit_log {filter} ORDER BY inserted_at DESC, seq ASC LIMIT ?"
        ))?;

        let rows = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawRow::decode).collect()
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl AuditStore for SqliteStore {
    fn append(&self, entry: &AuditEntry) -> Result<()> {
        let metadata = serde_json::to_string(&entry.metadata)?;
        self.conn()?.execute(
            "INSERT INTO audit_log
                 (id, action, user_id, ip_address, resource_type, resource_id, metadata, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id.to_string(),
                entry.action,
                entry.user_id,
                entry.ip_address,
                entry.resource_type,
                entry.resource_id,
                metadata,
                entry.inserted_at.timestamp_micros(),
            ],
        )?;
        Ok(())
    }

    fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query("WHERE user_id = ?", &[&user_id, &sql_limit(limit)])
    }

    fn list_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEntry>> {
        self.query(
            "WHERE resource_type = ? AND resource_id = ?",
            &[&resource_type, &resource_id, &sql_limit(limit)],
        )
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        self.query("", &[&sql_limit(limit)])
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Columns as read from SQLite, before parsing.
struct RawRow {
    id: String,
    action: String,
    user_id: Option<i64>,
    ip_address: Option<String>,
    resource_type: Option<String>,
    resource_id: Option<String>,
    metadata: String,
    inserted_at: i64,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            action: row.get(1)?,
            user_id: row.get(2)?,
            ip_address: row.get(3)?,
            resource_type: row.get(4)?,
            resource_id: row.get(5)?,
            metadata: row.get(6)?,
            inserted_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<AuditEntry> {
        Ok(AuditEntry {
            id: self
                .id
                .parse()
                .map_err(|_| Error::Corrupt(format!("invalid id '{}'", self.id)))?,
            inserted_at: DateTime::from_timestamp_micros(self.inserted_at).ok_or_else(|| {
                Error::Corrupt(format!("invalid timestamp {} for {}", self.inserted_at, self.id))
            })?,
            metadata: serde_json::from_str(&self.metadata)?,
            action: self.action,
            user_id: self.user_id,
            ip_address: self.ip_address,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
        })
    }
}
