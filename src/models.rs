use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asset categories available on the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetCategory {
    Equity,
    Bond,
    Derivative,
    CryptoLike,
    Exotic,
}

impl AssetCategory {
    pub fn as_str(&self) -> &str {
        match self {
            AssetCategory::Equity => "equity",
            AssetCategory::Bond => "bond",
            AssetCategory::Derivative => "derivative",
            AssetCategory::CryptoLike => "crypto-like",
            AssetCategory::Exotic => "exotic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "equity" => Some(AssetCategory::Equity),
            "bond" => Some(AssetCategory::Bond),
            "derivative" => Some(AssetCategory::Derivative),
            "crypto-like" => Some(AssetCategory::CryptoLike),
            "exotic" => Some(AssetCategory::Exotic),
            _ => None,
        }
    }
}

/// A tradable asset. Symbols are stored uppercase; volatility is a
/// long-horizon figure in [0, 1] that the simulator dampens per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: Uuid,
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub volatility: f64,
    pub description: String,
}

/// One persisted price observation for an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTick {
    pub asset_id: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Denormalized "current price" view served to the rest of the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub asset_id: String,
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Buy,
    Sell,
}

impl PositionSide {
    pub fn as_str(&self) -> &str {
        match self {
            PositionSide::Buy => "buy",
            PositionSide::Sell => "sell",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(PositionSide::Buy),
            "sell" => Some(PositionSide::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(PositionStatus::Open),
            "closed" => Some(PositionStatus::Closed),
            _ => None,
        }
    }
}

/// A paper-trading position owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub side: PositionSide,
    pub quantity: f64,
    pub open_price: f64,
    pub open_date: DateTime<Utc>,
    pub status: PositionStatus,
    pub close_price: Option<f64>,
    pub close_date: Option<DateTime<Utc>>,
}

impl Position {
    /// Realized PnL for closed positions, unrealized against `current_price`
    /// for open ones. Open positions without a current price report 0.
    pub fn pnl(&self, current_price: Option<f64>) -> f64 {
        let exit = match self.status {
            PositionStatus::Open => match current_price {
                Some(p) => p,
                None => return 0.0,
            },
            PositionStatus::Closed => match self.close_price {
                Some(p) => p,
                None => return 0.0,
            },
        };

        match self.side {
            PositionSide::Buy => (exit - self.open_price) * self.quantity,
            PositionSide::Sell => (self.open_price - exit) * self.quantity,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub jwt_secret: String,
    pub price_tick_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./nebulax.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());

        let price_tick_interval_ms = std::env::var("PRICE_TICK_INTERVAL_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        Ok(Self {
            database_path,
            port,
            jwt_secret,
            price_tick_interval_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_string_roundtrip() {
        assert_eq!(AssetCategory::CryptoLike.as_str(), "crypto-like");
        assert_eq!(
            AssetCategory::from_str("crypto-like"),
            Some(AssetCategory::CryptoLike)
        );
        assert_eq!(AssetCategory::from_str("EXOTIC"), Some(AssetCategory::Exotic));
        assert_eq!(AssetCategory::from_str("commodity"), None);
    }

    #[test]
    fn test_pnl_buy_and_sell() {
        let mut position = Position {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            side: PositionSide::Buy,
            quantity: 10.0,
            open_price: 100.0,
            open_date: Utc::now(),
            status: PositionStatus::Closed,
            close_price: Some(110.0),
            close_date: Some(Utc::now()),
        };

        assert_eq!(position.pnl(None), 100.0);

        position.side = PositionSide::Sell;
        assert_eq!(position.pnl(None), -100.0);
    }

    #[test]
    fn test_pnl_open_position_uses_current_price() {
        let position = Position {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            side: PositionSide::Buy,
            quantity: 2.0,
            open_price: 50.0,
            open_date: Utc::now(),
            status: PositionStatus::Open,
            close_price: None,
            close_date: None,
        };

        assert_eq!(position.pnl(Some(60.0)), 20.0);
        assert_eq!(position.pnl(None), 0.0);
    }
}
