//! Position endpoints. All of them sit behind the JWT middleware and are
//! scoped to the authenticated user.

use crate::api::routes::{ApiError, AppState};
use crate::auth::models::Claims;
use crate::models::{Position, PositionSide, PositionStatus};
use crate::positions::PositionSummary;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    /// Asset symbol (any case) or asset id
    pub asset_id: String,
    pub side: PositionSide,
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub close_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    /// Filter by "open" or "closed"
    pub status: Option<String>,
}

fn user_id(claims: &Claims) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::BadRequest("Invalid user id in token".to_string()))
}

/// Open a position at the asset's current simulated price - POST /api/positions
pub async fn open_position(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<OpenPositionRequest>,
) -> Result<(StatusCode, Json<Position>), ApiError> {
    if payload.quantity < 0.01 {
        return Err(ApiError::BadRequest(
            "Quantity must be at least 0.01".to_string(),
        ));
    }

    let user_id = user_id(&claims)?;
    let snapshot = state.engine.latest_price_for(&payload.asset_id)?;
    let asset_id = Uuid::parse_str(&snapshot.asset_id)
        .map_err(|_| ApiError::NotFound(format!("Asset {} not found", payload.asset_id)))?;

    let position = state
        .positions
        .open(user_id, asset_id, payload.side, payload.quantity, snapshot.price)?;

    info!(
        "📈 Opened {} position on {} ({} @ {})",
        position.side.as_str(),
        snapshot.symbol,
        position.quantity,
        position.open_price
    );

    Ok((StatusCode::CREATED, Json(position)))
}

/// Close an open position - POST /api/positions/:id/close
pub async fn close_position(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClosePositionRequest>,
) -> Result<Json<Position>, ApiError> {
    if payload.close_price < 0.0 {
        return Err(ApiError::BadRequest(
            "Close price must not be negative".to_string(),
        ));
    }

    let user_id = user_id(&claims)?;
    let position = state
        .positions
        .close(&id, &user_id, payload.close_price)?
        .ok_or_else(|| ApiError::NotFound("Position not found or already closed".to_string()))?;

    Ok(Json(position))
}

/// List the user's positions, optionally by status - GET /api/positions
pub async fn get_positions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PositionQuery>,
) -> Result<Json<Vec<Position>>, ApiError> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(
            PositionStatus::from_str(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid status {}", raw)))?,
        ),
        None => None,
    };

    let user_id = user_id(&claims)?;
    let positions = state.positions.list_for_user(&user_id, status)?;
    Ok(Json(positions))
}

/// Realized PnL rollup - GET /api/positions/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<PositionSummary>, ApiError> {
    let user_id = user_id(&claims)?;
    let summary = state.positions.summary_for_user(&user_id)?;
    Ok(Json(summary))
}

/// One position by id - GET /api/positions/:id
pub async fn get_position(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Position>, ApiError> {
    let user_id = user_id(&claims)?;
    state
        .positions
        .get(&id, &user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Position not found".to_string()))
}
