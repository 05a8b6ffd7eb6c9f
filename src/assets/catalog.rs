//! SQLite-backed asset catalog with idempotent seeding.
//!
//! Symbols are normalized to uppercase on write and lookup, so resolution is
//! case-insensitive. Identifiers resolve symbol-first, then as opaque ids.

use crate::models::{Asset, AssetCategory};
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    symbol TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    volatility REAL NOT NULL,
    description TEXT NOT NULL
) WITHOUT ROWID;
"#;

/// Payload for creating a catalog entry
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub volatility: f64,
    pub description: String,
}

pub struct AssetCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl AssetCatalog {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open asset catalog at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize asset catalog schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert the exchange's stock of exotic assets, skipping any symbol that
    /// already exists. Returns the number of assets created.
    pub fn seed_defaults(&self) -> Result<usize> {
        let mut created = 0;

        for seed in default_assets() {
            if self.exists(&seed.symbol)? {
                debug!("⏭️  Asset {} already exists, skipping", seed.symbol);
                continue;
            }

            let asset = self.create(seed)?;
            info!("🌱 Seeded asset: {} - {}", asset.symbol, asset.name);
            created += 1;
        }

        Ok(created)
    }

    pub fn create(&self, new_asset: NewAsset) -> Result<Asset> {
        if new_asset.symbol.trim().is_empty() {
            bail!("Asset symbol must not be empty");
        }
        if !(0.0..=1.0).contains(&new_asset.volatility) {
            bail!(
                "Asset volatility must be within [0, 1], got {}",
                new_asset.volatility
            );
        }

        let asset = Asset {
            id: Uuid::new_v4(),
            symbol: new_asset.symbol.trim().to_uppercase(),
            name: new_asset.name,
            category: new_asset.category,
            volatility: new_asset.volatility,
            description: new_asset.description,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO assets (id, symbol, name, category, volatility, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                asset.id.to_string(),
                asset.symbol,
                asset.name,
                asset.category.as_str(),
                asset.volatility,
                asset.description,
            ],
        )
        .with_context(|| format!("Failed to insert asset {}", asset.symbol))?;

        Ok(asset)
    }

    /// All assets ordered by symbol, optionally narrowed by category and a
    /// free-text search over symbol, name and description.
    pub fn list_filtered(
        &self,
        category: Option<AssetCategory>,
        search: Option<&str>,
    ) -> Result<Vec<Asset>> {
        let conn = self.conn.lock();

        let mut sql = String::from(
            "SELECT id, symbol, name, category, volatility, description FROM assets WHERE 1=1",
        );
        let mut bindings: Vec<String> = Vec::new();

        if let Some(category) = category {
            sql.push_str(" AND category = ?");
            bindings.push(category.as_str().to_string());
        }

        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            sql.push_str(" AND (symbol LIKE ? OR name LIKE ? OR description LIKE ?)");
            let pattern = format!("%{}%", search);
            bindings.push(pattern.clone());
            bindings.push(pattern.clone());
            bindings.push(pattern);
        }

        sql.push_str(" ORDER BY symbol ASC");

        let mut stmt = conn.prepare(&sql)?;
        let assets = stmt
            .query_map(rusqlite::params_from_iter(bindings.iter()), row_to_asset)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list assets")?;

        Ok(assets)
    }

    pub fn list(&self) -> Result<Vec<Asset>> {
        self.list_filtered(None, None)
    }

    pub fn find_by_symbol(&self, symbol: &str) -> Result<Option<Asset>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, symbol, name, category, volatility, description
             FROM assets WHERE symbol = ?1",
            params![symbol.trim().to_uppercase()],
            row_to_asset,
        );

        match result {
            Ok(asset) => Ok(Some(asset)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("Failed to query asset by symbol"),
        }
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<Asset>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT id, symbol, name, category, volatility, description
             FROM assets WHERE id = ?1",
            params![id.to_string()],
            row_to_asset,
        );

        match result {
            Ok(asset) => Ok(Some(asset)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).context("Failed to query asset by id"),
        }
    }

    /// Resolve an identifier that may be a symbol (any case) or an asset id.
    /// Symbols win, so a symbol that happens to parse as an id still resolves
    /// as a symbol.
    pub fn resolve(&self, identifier: &str) -> Result<Option<Asset>> {
        if let Some(asset) = self.find_by_symbol(identifier)? {
            return Ok(Some(asset));
        }

        if let Ok(id) = Uuid::parse_str(identifier.trim()) {
            return self.find_by_id(&id);
        }

        Ok(None)
    }

    pub fn exists(&self, symbol: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM assets WHERE symbol = ?1",
                params![symbol.trim().to_uppercase()],
                |row| row.get(0),
            )
            .context("Failed to check asset existence")?;
        Ok(count > 0)
    }
}

fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let id: String = row.get(0)?;
    let category: String = row.get(3)?;
    Ok(Asset {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        symbol: row.get(1)?,
        name: row.get(2)?,
        category: AssetCategory::from_str(&category).unwrap_or(AssetCategory::Exotic),
        volatility: row.get(4)?,
        description: row.get(5)?,
    })
}

fn default_assets() -> Vec<NewAsset> {
    vec![
        NewAsset {
            symbol: "QCRD".to_string(),
            name: "Quantum Credit".to_string(),
            category: AssetCategory::Exotic,
            volatility: 0.65,
            description: "A revolutionary credit instrument backed by quantum entanglement \
                          principles. Highly volatile but offers unprecedented yield potential \
                          in parallel universes."
                .to_string(),
        },
        NewAsset {
            symbol: "PHBN".to_string(),
            name: "Photon Bond".to_string(),
            category: AssetCategory::Bond,
            volatility: 0.25,
            description: "A stable fixed-income security backed by photon stream revenues from \
                          deep space communication networks. Lower risk, consistent returns."
                .to_string(),
        },
        NewAsset {
            symbol: "DRKM".to_string(),
            name: "Dark Matter Future".to_string(),
            category: AssetCategory::Derivative,
            volatility: 0.8,
            description: "A high-risk derivative contract based on dark matter density \
                          fluctuations. Extreme volatility with massive profit potential for \
                          experienced traders."
                .to_string(),
        },
        NewAsset {
            symbol: "NBLX".to_string(),
            name: "Nebula ETF".to_string(),
            category: AssetCategory::Equity,
            volatility: 0.45,
            description: "A diversified exchange-traded fund tracking a basket of interstellar \
                          mining operations and gas cloud extraction companies. Balanced \
                          risk-reward profile."
                .to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_catalog() -> (AssetCatalog, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let catalog = AssetCatalog::new(temp_file.path().to_str().unwrap()).unwrap();
        (catalog, temp_file)
    }

    #[test]
    fn test_seed_is_idempotent() {
        let (catalog, _temp) = create_test_catalog();

        assert_eq!(catalog.seed_defaults().unwrap(), 4);
        assert_eq!(catalog.seed_defaults().unwrap(), 0);
        assert_eq!(catalog.list().unwrap().len(), 4);
    }

    #[test]
    fn test_list_is_symbol_ordered() {
        let (catalog, _temp) = create_test_catalog();
        catalog.seed_defaults().unwrap();

        let symbols: Vec<String> = catalog
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.symbol)
            .collect();
        assert_eq!(symbols, vec!["DRKM", "NBLX", "PHBN", "QCRD"]);
    }

    #[test]
    fn test_symbol_lookup_is_case_insensitive() {
        let (catalog, _temp) = create_test_catalog();
        catalog.seed_defaults().unwrap();

        let asset = catalog.find_by_symbol("qcrd").unwrap().unwrap();
        assert_eq!(asset.symbol, "QCRD");
        assert_eq!(asset.volatility, 0.65);
    }

    #[test]
    fn test_resolve_by_symbol_and_id() {
        let (catalog, _temp) = create_test_catalog();
        catalog.seed_defaults().unwrap();

        let by_symbol = catalog.resolve("phbn").unwrap().unwrap();
        let by_id = catalog
            .resolve(&by_symbol.id.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(by_symbol.id, by_id.id);

        assert!(catalog.resolve("no-such-asset").unwrap().is_none());
    }

    #[test]
    fn test_create_normalizes_symbol() {
        let (catalog, _temp) = create_test_catalog();

        let asset = catalog
            .create(NewAsset {
                symbol: " grvt ".to_string(),
                name: "Graviton Swap".to_string(),
                category: AssetCategory::Derivative,
                volatility: 0.5,
                description: "Test instrument".to_string(),
            })
            .unwrap();

        assert_eq!(asset.symbol, "GRVT");
        assert!(catalog.exists("grvt").unwrap());
    }

    #[test]
    fn test_create_rejects_invalid_volatility() {
        let (catalog, _temp) = create_test_catalog();

        let result = catalog.create(NewAsset {
            symbol: "BAD".to_string(),
            name: "Bad Asset".to_string(),
            category: AssetCategory::Equity,
            volatility: 1.5,
            description: "Out of range".to_string(),
        });
        assert!(result.is_err());

        let result = catalog.create(NewAsset {
            symbol: "  ".to_string(),
            name: "No Symbol".to_string(),
            category: AssetCategory::Equity,
            volatility: 0.5,
            description: "Empty symbol".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_filtered_listing() {
        let (catalog, _temp) = create_test_catalog();
        catalog.seed_defaults().unwrap();

        let bonds = catalog
            .list_filtered(Some(AssetCategory::Bond), None)
            .unwrap();
        assert_eq!(bonds.len(), 1);
        assert_eq!(bonds[0].symbol, "PHBN");

        let dark = catalog.list_filtered(None, Some("dark matter")).unwrap();
        assert_eq!(dark.len(), 1);
        assert_eq!(dark[0].symbol, "DRKM");
    }
}
