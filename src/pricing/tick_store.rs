//! Append-only price tick log backed by SQLite.
//!
//! - WAL mode for concurrent reads during scheduled writes
//! - Single connection guarded by a parking_lot mutex
//! - Timestamps persisted as unix milliseconds

use crate::models::PriceTick;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::sync::Arc;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS price_ticks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    price REAL NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_price_ticks_asset_ts
    ON price_ticks(asset_id, timestamp DESC);
"#;

/// Persisted tick history. Rows are only ever appended by the simulator and
/// bulk-deleted by the retention compactor.
pub struct TickStore {
    conn: Arc<Mutex<Connection>>,
}

impl TickStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open tick store at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize tick store schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let existing: i64 = conn
            .query_row("SELECT COUNT(*) FROM price_ticks", [], |row| row.get(0))
            .unwrap_or(0);
        info!("📊 Tick store initialized ({} existing ticks)", existing);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Durably record one tick. Failures propagate to the caller; the
    /// scheduler logs them without committing the matching cache entry.
    pub fn append(&self, asset_id: &str, price: f64, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO price_ticks (asset_id, price, timestamp) VALUES (?1, ?2, ?3)",
            params![asset_id, price, timestamp.timestamp_millis()],
        )
        .with_context(|| format!("Failed to append tick for asset {}", asset_id))?;
        Ok(())
    }

    /// Most recent tick for one asset by timestamp (insertion order breaks
    /// same-millisecond ties).
    pub fn latest(&self, asset_id: &str) -> Result<Option<PriceTick>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT asset_id, price, timestamp FROM price_ticks
                 WHERE asset_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                params![asset_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .with_context(|| format!("Failed to query latest tick for asset {}", asset_id))?;

        row.map(|(asset_id, price, millis)| {
            let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
                .with_context(|| format!("Invalid tick timestamp {} for {}", millis, asset_id))?;
            Ok(PriceTick {
                asset_id,
                price,
                timestamp,
            })
        })
        .transpose()
    }

    /// Total ticks across all assets; used solely by the compaction check.
    pub fn count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM price_ticks", [], |row| row.get(0))
            .context("Failed to count price ticks")
    }

    /// Unconditional full-history purge. Returns the number of rows removed.
    pub fn purge_all(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM price_ticks", [])
            .context("Failed to purge price ticks")?;
        Ok(deleted)
    }
}
