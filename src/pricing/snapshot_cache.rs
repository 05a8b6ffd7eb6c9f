//! In-memory latest-price cache.
//!
//! One entry per asset, overwritten on every simulation step. Readers on the
//! serving path never block on the scheduled writer beyond the RwLock; a read
//! may observe either the pre-step or post-step snapshot.

use crate::models::PriceSnapshot;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-wide snapshot map with an explicit lifecycle: built at bootstrap,
/// `clear`ed at shutdown.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: RwLock<HashMap<String, PriceSnapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, asset_id: &str) -> Option<PriceSnapshot> {
        self.inner.read().get(asset_id).cloned()
    }

    /// Unconditional overwrite. Called by the scheduler after a successful
    /// tick append, and by the cache-miss reconciliation path.
    pub fn set(&self, snapshot: PriceSnapshot) {
        self.inner
            .write()
            .insert(snapshot.asset_id.clone(), snapshot);
    }

    /// Point-in-time listing for dashboards. No ordering guarantee.
    pub fn all(&self) -> Vec<PriceSnapshot> {
        self.inner.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(asset_id: &str, price: f64) -> PriceSnapshot {
        PriceSnapshot {
            asset_id: asset_id.to_string(),
            symbol: "QCRD".to_string(),
            name: "Quantum Credit".to_string(),
            price,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_set_overwrites_existing_entry() {
        let cache = SnapshotCache::new();

        cache.set(snapshot("a1", 150.0));
        cache.set(snapshot("a1", 151.5));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a1").unwrap().price, 151.5);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let cache = SnapshotCache::new();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn test_all_returns_every_entry() {
        let cache = SnapshotCache::new();
        cache.set(snapshot("a1", 150.0));
        cache.set(snapshot("a2", 99.0));

        let mut prices: Vec<f64> = cache.all().iter().map(|s| s.price).collect();
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(prices, vec![99.0, 150.0]);
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = SnapshotCache::new();
        cache.set(snapshot("a1", 150.0));

        cache.clear();
        assert!(cache.is_empty());
    }
}
