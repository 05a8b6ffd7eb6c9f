//! NebulaX - Trading Simulation Exchange Backend
//! Mission: Serve simulated market prices and paper positions over REST

use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nebulax_backend::{
    api::{create_router, AppState},
    assets::AssetCatalog,
    auth::{AuthState, JwtHandler, UserStore},
    models::Config,
    positions::PositionStore,
    pricing::{PricingEngine, TickStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("🚀 NebulaX Exchange Backend starting");

    let config = Config::from_env()?;

    // Stores share one sqlite file; WAL keeps readers live during writes
    let catalog = Arc::new(AssetCatalog::new(&config.database_path)?);
    let seeded = catalog.seed_defaults()?;
    if seeded > 0 {
        info!("🌱 Seeded {} default assets", seeded);
    }

    let ticks = Arc::new(TickStore::new(&config.database_path)?);
    let positions = Arc::new(PositionStore::new(&config.database_path)?);
    let user_store = Arc::new(UserStore::new(&config.database_path)?);
    info!("📊 Database initialized at: {}", config.database_path);

    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone()));

    // Price simulation engine: bootstrap the cache, then start the ticker
    let engine = Arc::new(PricingEngine::new(
        catalog.clone(),
        ticks,
        config.price_tick_interval_ms,
    ));
    engine.bootstrap()?;
    let ticker_handle = engine.clone().spawn_ticker();
    info!(
        "💹 Price simulator started (interval {}ms)",
        config.price_tick_interval_ms
    );

    let app_state = AppState {
        engine: engine.clone(),
        catalog,
        positions,
    };
    let auth_state = AuthState::new(user_store, jwt_handler.clone());

    let app = create_router(app_state, auth_state, jwt_handler);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop scheduling further cycles; the cycle in flight finishes first
    engine.shutdown();
    let _ = ticker_handle.await;
    info!("👋 NebulaX Exchange Backend stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
    }
}

/// Initialize tracing with env-filter support
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nebulax_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
