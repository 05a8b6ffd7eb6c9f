//! Price Simulation Engine
//! Mission: Keep every asset priced with a bounded random walk, a snapshot
//! cache and a compacted persistent tick history

pub mod engine;
pub mod simulator;
pub mod snapshot_cache;
pub mod tick_store;

pub use engine::{PricingEngine, PricingError};
pub use snapshot_cache::SnapshotCache;
pub use tick_store::TickStore;
