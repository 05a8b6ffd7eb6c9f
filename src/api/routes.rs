use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::assets::AssetCatalog;
use crate::auth::{api as auth_api, auth_middleware, AuthState, JwtHandler};
use crate::models::{Asset, AssetCategory, PriceSnapshot};
use crate::positions::{api as positions_api, PositionStore};
use crate::pricing::{PricingEngine, PricingError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PricingEngine>,
    pub catalog: Arc<AssetCatalog>,
    pub positions: Arc<PositionStore>,
}

/// Create the API router: public catalog/pricing/auth routes plus
/// JWT-protected position routes.
pub fn create_router(
    app_state: AppState,
    auth_state: AuthState,
    jwt_handler: Arc<JwtHandler>,
) -> Router {
    let auth_router = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login))
        .with_state(auth_state);

    let protected_routes = Router::new()
        .route(
            "/api/positions",
            post(positions_api::open_position).get(positions_api::get_positions),
        )
        .route("/api/positions/summary", get(positions_api::get_summary))
        .route("/api/positions/:id", get(positions_api::get_position))
        .route("/api/positions/:id/close", post(positions_api::close_position))
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route_layer(middleware::from_fn_with_state(jwt_handler, auth_middleware))
        .with_state(app_state.clone());

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/assets", get(get_assets))
        .route("/api/assets/:identifier", get(get_asset))
        .route("/api/pricing", get(get_latest_prices))
        .route("/api/pricing/:identifier", get(get_price))
        .with_state(app_state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List assets with optional category/search filters
async fn get_assets(
    State(state): State<AppState>,
    Query(params): Query<AssetQuery>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    let category = match params.category.as_deref() {
        Some(raw) => Some(
            AssetCategory::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid category {}", raw)))?,
        ),
        None => None,
    };

    let assets = state
        .catalog
        .list_filtered(category, params.search.as_deref())?;
    Ok(Json(assets))
}

/// Get one asset by symbol (case-insensitive) or id
async fn get_asset(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<Asset>, ApiError> {
    state
        .catalog
        .resolve(&identifier)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Asset {} not found", identifier)))
}

/// Latest snapshot for every asset
async fn get_latest_prices(State(state): State<AppState>) -> Json<Vec<PriceSnapshot>> {
    Json(state.engine.latest_prices())
}

/// Latest snapshot for one asset by symbol or id
async fn get_price(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<PriceSnapshot>, ApiError> {
    let snapshot = state.engine.latest_price_for(&identifier)?;
    Ok(Json(snapshot))
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct AssetQuery {
    /// Filter by category ("equity", "bond", "derivative", "crypto-like", "exotic")
    category: Option<String>,
    /// Free-text search over symbol, name and description
    search: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    Database(anyhow::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Database(err)
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        // Serving-path pricing failures are uniformly not-found shaped
        ApiError::NotFound(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = anyhow::anyhow!("Test error");
        let api_err: ApiError = err.into();

        match api_err {
            ApiError::Database(_) => (),
            _ => panic!("Expected Database error"),
        }
    }

    #[test]
    fn test_pricing_errors_map_to_not_found() {
        let api_err: ApiError = PricingError::AssetNotFound("ZZZZ".to_string()).into();
        assert_eq!(api_err.into_response().status(), StatusCode::NOT_FOUND);

        let api_err: ApiError = PricingError::NoPriceData("VOID".to_string()).into();
        assert_eq!(api_err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
