//! Asset Catalog
//! Mission: Own the list of tradable assets and their volatility profile

pub mod catalog;

pub use catalog::{AssetCatalog, NewAsset};
