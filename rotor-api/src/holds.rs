use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rotor_core::models::FlightHold;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub flight_id: Uuid,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub passenger_count: u32,
}

#[derive(Debug, Serialize)]
pub struct CreateHoldResponse {
    pub success: bool,
    pub hold: FlightHold,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseHoldRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub flight_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseHoldResponse {
    pub success: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/holds/create", post(create_hold))
        .route("/api/holds/release", post(release_hold))
}

async fn create_hold(
    State(state): State<AppState>,
    Json(req): Json<CreateHoldRequest>,
) -> Result<Json<CreateHoldResponse>, AppError> {
    let hold = state
        .holds
        .create_hold(req.flight_id, &req.session_id, req.passenger_count)
        .await?;

    Ok(Json(CreateHoldResponse {
        success: true,
        hold,
        expires_in_seconds: u64::try_from(state.holds.policy().ttl().num_seconds()).unwrap_or(0),
    }))
}

async fn release_hold(
    State(state): State<AppState>,
    Json(req): Json<ReleaseHoldRequest>,
) -> Result<Json<ReleaseHoldResponse>, AppError> {
    state.holds.release_hold(&req.session_id, req.flight_id).await?;
    Ok(Json(ReleaseHoldResponse { success: true }))
}
