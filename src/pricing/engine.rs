//! Continuous price-simulation engine.
//!
//! Owns the snapshot cache and drives the random walk: bootstrap projects the
//! last persisted tick per asset (synthesizing a starting price where history
//! is missing or decayed), a periodic scheduler steps every asset
//! independently, and a retention check purges the tick log once it crosses
//! the size threshold.

use crate::assets::AssetCatalog;
use crate::models::{Asset, PriceSnapshot};
use crate::pricing::{simulator, SnapshotCache, TickStore};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Full-history purge threshold for the tick log
pub const TICK_PURGE_THRESHOLD: i64 = 2000;

/// Serving-path errors. Store failures inside the scheduler are logged and
/// never reach readers; the only user-visible failures are not-found shaped.
#[derive(Debug)]
pub enum PricingError {
    AssetNotFound(String),
    NoPriceData(String),
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::AssetNotFound(identifier) => {
                write!(f, "Asset {} not found", identifier)
            }
            PricingError::NoPriceData(symbol) => {
                write!(f, "No price data available for asset {}", symbol)
            }
        }
    }
}

impl std::error::Error for PricingError {}

pub struct PricingEngine {
    catalog: Arc<AssetCatalog>,
    ticks: Arc<TickStore>,
    cache: SnapshotCache,
    tick_interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl PricingEngine {
    pub fn new(catalog: Arc<AssetCatalog>, ticks: Arc<TickStore>, tick_interval_ms: u64) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            catalog,
            ticks,
            cache: SnapshotCache::new(),
            tick_interval: Duration::from_millis(tick_interval_ms),
            shutdown,
        }
    }

    /// Populate the snapshot cache for every cataloged asset, synthesizing a
    /// starting price where no usable history exists. Idempotent: a second
    /// run reconciles from the persisted ticks the first run wrote.
    pub fn bootstrap(&self) -> Result<()> {
        let assets = self.catalog.list()?;

        for asset in &assets {
            let snapshot = match self.snapshot_from_last_tick(asset)? {
                Some(snapshot) => snapshot,
                None => self.create_initial_snapshot(asset)?,
            };
            self.cache.set(snapshot);
        }

        info!("💹 Price cache bootstrapped for {} assets", assets.len());
        Ok(())
    }

    /// Spawn the periodic scheduler. The first cycle fires one full interval
    /// after startup; bootstrap has already priced every asset by then.
    pub fn spawn_ticker(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.clone().run_cycle().await,
                    _ = shutdown_rx.changed() => break,
                }
            }

            debug!("price ticker stopped");
        })
    }

    /// Stop scheduling further cycles and tear down the cache. The cycle in
    /// flight (if any) finishes before the ticker task exits.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.cache.clear();
    }

    /// One scheduled cycle: retention check first, then an independent step
    /// task per asset, joined before the cycle ends. One asset failing never
    /// aborts the others.
    pub async fn run_cycle(self: Arc<Self>) {
        self.compact();

        let assets = match self.catalog.list() {
            Ok(assets) => assets,
            Err(e) => {
                warn!("asset listing failed, skipping price cycle: {:#}", e);
                return;
            }
        };

        let mut handles = Vec::with_capacity(assets.len());
        for asset in assets {
            let engine = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                if let Err(e) = engine.step_asset(&asset) {
                    warn!("price step failed for {}: {:#}", asset.symbol, e);
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("price step task panicked: {}", e);
            }
        }
    }

    /// Advance one asset's walk. The cache entry commits only after the tick
    /// append succeeded, so a write failure leaves readers on the previous
    /// snapshot instead of an unpersisted price.
    fn step_asset(&self, asset: &Asset) -> Result<()> {
        let key = asset.id.to_string();

        let mut previous = match self.cache.get(&key) {
            Some(snapshot) => snapshot,
            None => match self.snapshot_from_last_tick(asset)? {
                Some(snapshot) => snapshot,
                None => self.create_initial_snapshot(asset)?,
            },
        };

        // A decayed series is re-seeded from a fresh base, not continued.
        if simulator::is_degenerate(previous.price) {
            previous = self.create_initial_snapshot(asset)?;
        }

        let price = simulator::next_price(previous.price, asset.volatility, &mut rand::thread_rng());
        let timestamp = Utc::now();

        self.ticks.append(&key, price, timestamp)?;
        self.cache.set(PriceSnapshot {
            asset_id: key,
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            price,
            timestamp,
        });

        Ok(())
    }

    fn compact(&self) {
        match self.ticks.count() {
            Ok(total) if total >= TICK_PURGE_THRESHOLD => match self.ticks.purge_all() {
                Ok(deleted) => {
                    info!(
                        "🧹 Purged {} price ticks (threshold {})",
                        deleted, TICK_PURGE_THRESHOLD
                    );
                }
                Err(e) => warn!("price tick purge failed: {:#}", e),
            },
            Ok(_) => {}
            Err(e) => warn!("price tick count failed: {:#}", e),
        }
    }

    /// Project the last persisted tick into a snapshot, if it is usable.
    /// Degenerate ticks (price below the re-seed floor) are treated as absent.
    fn snapshot_from_last_tick(&self, asset: &Asset) -> Result<Option<PriceSnapshot>> {
        let Some(tick) = self.ticks.latest(&asset.id.to_string())? else {
            return Ok(None);
        };

        if simulator::is_degenerate(tick.price) {
            return Ok(None);
        }

        Ok(Some(PriceSnapshot {
            asset_id: tick.asset_id,
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            price: simulator::round2(tick.price),
            timestamp: tick.timestamp,
        }))
    }

    /// Synthesize a starting price, persist it as the asset's first tick and
    /// return its projection. Only the scheduler and bootstrap call this;
    /// read paths never invent prices.
    fn create_initial_snapshot(&self, asset: &Asset) -> Result<PriceSnapshot> {
        let price = simulator::synthesize_base_price(&asset.symbol, &mut rand::thread_rng());
        let timestamp = Utc::now();

        self.ticks.append(&asset.id.to_string(), price, timestamp)?;

        Ok(PriceSnapshot {
            asset_id: asset.id.to_string(),
            symbol: asset.symbol.clone(),
            name: asset.name.clone(),
            price,
            timestamp,
        })
    }

    /// Point-in-time view of every cached snapshot.
    pub fn latest_prices(&self) -> Vec<PriceSnapshot> {
        self.cache.all()
    }

    /// Current price for one asset, by case-insensitive symbol or id. On a
    /// cache miss the last persisted tick is reconciled into the cache; a
    /// missing or degenerate history surfaces as `NoPriceData`.
    pub fn latest_price_for(&self, identifier: &str) -> Result<PriceSnapshot, PricingError> {
        let asset = self
            .catalog
            .resolve(identifier)
            .unwrap_or_else(|e| {
                warn!("asset lookup failed for {}: {:#}", identifier, e);
                None
            })
            .ok_or_else(|| PricingError::AssetNotFound(identifier.to_string()))?;

        let key = asset.id.to_string();
        if let Some(snapshot) = self.cache.get(&key) {
            return Ok(snapshot);
        }

        let reconciled = self.snapshot_from_last_tick(&asset).unwrap_or_else(|e| {
            warn!("tick reconciliation failed for {}: {:#}", asset.symbol, e);
            None
        });

        match reconciled {
            Some(snapshot) => {
                self.cache.set(snapshot.clone());
                Ok(snapshot)
            }
            None => Err(PricingError::NoPriceData(asset.symbol.clone())),
        }
    }
}
