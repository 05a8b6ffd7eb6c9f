//! SQLite-backed position storage, owner-scoped throughout.

use crate::models::{Position, PositionSide, PositionStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS positions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    asset_id TEXT NOT NULL,
    side TEXT NOT NULL,
    quantity REAL NOT NULL,
    open_price REAL NOT NULL,
    open_date INTEGER NOT NULL,
    status TEXT NOT NULL,
    close_price REAL,
    close_date INTEGER
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_positions_user
    ON positions(user_id, open_date DESC);
CREATE INDEX IF NOT EXISTS idx_positions_status
    ON positions(status);
"#;

/// Realized PnL rollup for a user's closed positions
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    pub total_pnl: f64,
    pub pnl_by_asset: HashMap<String, f64>,
    pub open_positions: usize,
    pub closed_positions: usize,
}

pub struct PositionStore {
    conn: Arc<Mutex<Connection>>,
}

impl PositionStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open position store at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize position store schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a position at the supplied price (the caller captures the
    /// current snapshot price before calling).
    pub fn open(
        &self,
        user_id: Uuid,
        asset_id: Uuid,
        side: PositionSide,
        quantity: f64,
        open_price: f64,
    ) -> Result<Position> {
        let position = Position {
            id: Uuid::new_v4(),
            user_id,
            asset_id,
            side,
            quantity,
            open_price,
            open_date: Utc::now(),
            status: PositionStatus::Open,
            close_price: None,
            close_date: None,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO positions
             (id, user_id, asset_id, side, quantity, open_price, open_date, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                position.id.to_string(),
                position.user_id.to_string(),
                position.asset_id.to_string(),
                position.side.as_str(),
                position.quantity,
                position.open_price,
                position.open_date.timestamp_millis(),
                position.status.as_str(),
            ],
        )
        .context("Failed to insert position")?;

        Ok(position)
    }

    /// Close an open position owned by `user_id`. Returns `None` when the
    /// position does not exist, belongs to someone else, or is already closed.
    pub fn close(
        &self,
        position_id: &Uuid,
        user_id: &Uuid,
        close_price: f64,
    ) -> Result<Option<Position>> {
        let close_date = Utc::now();

        {
            let conn = self.conn.lock();
            let updated = conn
                .execute(
                    "UPDATE positions
                     SET status = 'closed', close_price = ?1, close_date = ?2
                     WHERE id = ?3 AND user_id = ?4 AND status = 'open'",
                    params![
                        close_price,
                        close_date.timestamp_millis(),
                        position_id.to_string(),
                        user_id.to_string(),
                    ],
                )
                .context("Failed to close position")?;

            if updated == 0 {
                return Ok(None);
            }
        }

        self.get(position_id, user_id)
    }

    pub fn list_for_user(
        &self,
        user_id: &Uuid,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>> {
        let conn = self.conn.lock();

        let mut sql = String::from(
            "SELECT id, user_id, asset_id, side, quantity, open_price, open_date,
                    status, close_price, close_date
             FROM positions WHERE user_id = ?",
        );
        let mut bindings = vec![user_id.to_string()];

        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        sql.push_str(" ORDER BY open_date DESC");

        let mut stmt = conn.prepare(&sql)?;
        let positions = stmt
            .query_map(rusqlite::params_from_iter(bindings.iter()), row_to_position)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list positions")?;

        Ok(positions)
    }

    pub fn get(&self, position_id: &Uuid, user_id: &Uuid) -> Result<Option<Position>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, user_id, asset_id, side, quantity, open_price, open_date,
                    status, close_price, close_date
             FROM positions WHERE id = ?1 AND user_id = ?2",
            params![position_id.to_string(), user_id.to_string()],
            row_to_position,
        );

        match result {
            Ok(position) => Ok(Some(position)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("Failed to query position"),
        }
    }

    /// Realized PnL across the user's closed positions plus open/closed
    /// counts; open positions contribute to the count only.
    pub fn summary_for_user(&self, user_id: &Uuid) -> Result<PositionSummary> {
        let positions = self.list_for_user(user_id, None)?;

        let mut summary = PositionSummary {
            total_pnl: 0.0,
            pnl_by_asset: HashMap::new(),
            open_positions: 0,
            closed_positions: 0,
        };

        for position in positions {
            match position.status {
                PositionStatus::Open => summary.open_positions += 1,
                PositionStatus::Closed => {
                    summary.closed_positions += 1;
                    let pnl = position.pnl(None);
                    summary.total_pnl += pnl;
                    *summary
                        .pnl_by_asset
                        .entry(position.asset_id.to_string())
                        .or_insert(0.0) += pnl;
                }
            }
        }

        Ok(summary)
    }
}

fn row_to_position(row: &Row<'_>) -> rusqlite::Result<Position> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let asset_id: String = row.get(2)?;
    let side: String = row.get(3)?;
    let status: String = row.get(7)?;
    let open_millis: i64 = row.get(6)?;
    let close_millis: Option<i64> = row.get(9)?;

    Ok(Position {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        user_id: Uuid::parse_str(&user_id).unwrap_or_default(),
        asset_id: Uuid::parse_str(&asset_id).unwrap_or_default(),
        side: PositionSide::from_str(&side).unwrap_or(PositionSide::Buy),
        quantity: row.get(4)?,
        open_price: row.get(5)?,
        open_date: millis_to_datetime(open_millis),
        status: PositionStatus::from_str(&status).unwrap_or(PositionStatus::Open),
        close_price: row.get(8)?,
        close_date: close_millis.map(millis_to_datetime),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (PositionStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = PositionStore::new(temp_file.path().to_str().unwrap()).unwrap();
        (store, temp_file)
    }

    #[test]
    fn test_open_and_get() {
        let (store, _temp) = create_test_store();
        let user = Uuid::new_v4();
        let asset = Uuid::new_v4();

        let opened = store
            .open(user, asset, PositionSide::Buy, 5.0, 150.0)
            .unwrap();

        let fetched = store.get(&opened.id, &user).unwrap().unwrap();
        assert_eq!(fetched.status, PositionStatus::Open);
        assert_eq!(fetched.open_price, 150.0);
        assert_eq!(fetched.quantity, 5.0);
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let (store, _temp) = create_test_store();
        let owner = Uuid::new_v4();

        let position = store
            .open(owner, Uuid::new_v4(), PositionSide::Buy, 1.0, 100.0)
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(store.get(&position.id, &stranger).unwrap().is_none());
    }

    #[test]
    fn test_close_only_once_and_only_by_owner() {
        let (store, _temp) = create_test_store();
        let owner = Uuid::new_v4();

        let position = store
            .open(owner, Uuid::new_v4(), PositionSide::Buy, 2.0, 100.0)
            .unwrap();

        // A stranger cannot close it
        let stranger = Uuid::new_v4();
        assert!(store.close(&position.id, &stranger, 110.0).unwrap().is_none());

        let closed = store.close(&position.id, &owner, 110.0).unwrap().unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_eq!(closed.close_price, Some(110.0));
        assert!(closed.close_date.is_some());

        // Already closed
        assert!(store.close(&position.id, &owner, 120.0).unwrap().is_none());
    }

    #[test]
    fn test_list_filters_by_status() {
        let (store, _temp) = create_test_store();
        let user = Uuid::new_v4();
        let asset = Uuid::new_v4();

        let p1 = store.open(user, asset, PositionSide::Buy, 1.0, 100.0).unwrap();
        store.open(user, asset, PositionSide::Sell, 2.0, 100.0).unwrap();
        store.close(&p1.id, &user, 105.0).unwrap();

        assert_eq!(store.list_for_user(&user, None).unwrap().len(), 2);
        assert_eq!(
            store
                .list_for_user(&user, Some(PositionStatus::Open))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store
                .list_for_user(&user, Some(PositionStatus::Closed))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_summary_rolls_up_realized_pnl() {
        let (store, _temp) = create_test_store();
        let user = Uuid::new_v4();
        let asset_a = Uuid::new_v4();
        let asset_b = Uuid::new_v4();

        let buy = store.open(user, asset_a, PositionSide::Buy, 10.0, 100.0).unwrap();
        store.close(&buy.id, &user, 110.0).unwrap(); // +100

        let sell = store.open(user, asset_b, PositionSide::Sell, 5.0, 50.0).unwrap();
        store.close(&sell.id, &user, 52.0).unwrap(); // -10

        store.open(user, asset_a, PositionSide::Buy, 1.0, 100.0).unwrap(); // open, excluded

        let summary = store.summary_for_user(&user).unwrap();
        assert_eq!(summary.open_positions, 1);
        assert_eq!(summary.closed_positions, 2);
        assert!((summary.total_pnl - 90.0).abs() < 1e-9);
        assert!((summary.pnl_by_asset[&asset_a.to_string()] - 100.0).abs() < 1e-9);
        assert!((summary.pnl_by_asset[&asset_b.to_string()] + 10.0).abs() < 1e-9);
    }
}
