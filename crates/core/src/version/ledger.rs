//! Append-only record of saves, one row per produced version.

use crate::error::BoxError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{trace, warn};

/// One save event for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub video_id: String,
    pub version: u32,
    pub submitter_ip: String,
    pub submitted_at: DateTime<Utc>,
    pub lang: String,
}

/// Storage for ledger rows.
///
/// `stage` reserves the next version for a video and writes its row without making
/// it visible. The row becomes permanent on [`StagedEntry::commit`]; dropping the
/// handle discards it.
pub trait Ledger: Send + Sync {
    fn last_version(&self, video_id: &str) -> Result<u32, BoxError>;

    fn entries(&self, video_id: &str) -> Result<Vec<LedgerEntry>, BoxError>;

    fn stage<'a>(
        &'a self,
        video_id: &str,
        submitter_ip: &str,
        lang: &str,
        at: DateTime<Utc>,
    ) -> Result<Box<dyn StagedEntry + 'a>, BoxError>;
}

pub trait StagedEntry {
    fn version(&self) -> u32;
    fn commit(self: Box<Self>) -> Result<(), BoxError>;
}

/// Ledger kept in a single SQLite table keyed by video id.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self, BoxError> {
        trace!("open ledger path={}", path.display());
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, BoxError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, BoxError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger (
                video_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                submitter_ip TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                lang TEXT NOT NULL,
                PRIMARY KEY (video_id, version)
            )",
            (),
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BoxError> {
        self.conn
            .lock()
            .map_err(|_| "ledger connection poisoned".into())
    }
}

fn last_version(conn: &Connection, video_id: &str) -> rusqlite::Result<u32> {
    let max: Option<u32> = conn
        .query_row(
            "SELECT MAX(version) FROM ledger WHERE video_id = ?1",
            [video_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    Ok(max.unwrap_or(0))
}

impl Ledger for SqliteLedger {
    fn last_version(&self, video_id: &str) -> Result<u32, BoxError> {
        let conn = self.lock()?;
        Ok(last_version(&conn, video_id)?)
    }

    fn entries(&self, video_id: &str) -> Result<Vec<LedgerEntry>, BoxError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, version, submitter_ip, submitted_at, lang
             FROM ledger WHERE video_id = ?1 ORDER BY version",
        )?;
        let rows = stmt.query_map([video_id], |row| {
            Ok(LedgerEntry {
                video_id: row.get(0)?,
                version: row.get(1)?,
                submitter_ip: row.get(2)?,
                submitted_at: row.get(3)?,
                lang: row.get(4)?,
            })
        })?;
        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn stage<'a>(
        &'a self,
        video_id: &str,
        submitter_ip: &str,
        lang: &str,
        at: DateTime<Utc>,
    ) -> Result<Box<dyn StagedEntry + 'a>, BoxError> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let mut staged = SqliteStaged {
            conn,
            version: 0,
            open: true,
        };
        let version = last_version(&staged.conn, video_id)? + 1;
        staged.conn.execute(
            "INSERT INTO ledger (video_id, version, submitter_ip, submitted_at, lang)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![video_id, version, submitter_ip, at, lang],
        )?;
        staged.version = version;
        trace!("staged {video_id} r{version}");
        Ok(Box::new(staged))
    }
}

struct SqliteStaged<'a> {
    conn: MutexGuard<'a, Connection>,
    version: u32,
    open: bool,
}

impl StagedEntry for SqliteStaged<'_> {
    fn version(&self) -> u32 {
        self.version
    }

    fn commit(mut self: Box<Self>) -> Result<(), BoxError> {
        self.conn.execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }
}

impl Drop for SqliteStaged<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!("ledger rollback failed: {err}");
            }
        }
    }
}
