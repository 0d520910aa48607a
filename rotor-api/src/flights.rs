use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use rotor_core::models::{AvailableFlight, BookingDetail};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FlightListResponse {
    pub flights: Vec<AvailableFlight>,
}

#[derive(Debug, Serialize)]
pub struct FlightBookingsResponse {
    pub bookings: Vec<BookingDetail>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/flights", get(list_flights))
        .route("/api/flights/{id}/bookings", get(flight_bookings))
}

/// GET /api/flights
/// Upcoming bookable flights with route and availability
async fn list_flights(State(state): State<AppState>) -> Result<Json<FlightListResponse>, AppError> {
    let flights = state
        .holds
        .available_flights(state.business_rules.flight_list_limit)
        .await?;
    Ok(Json(FlightListResponse { flights }))
}

/// GET /api/flights/{id}/bookings
/// Coordinator manifest
async fn flight_bookings(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<FlightBookingsResponse>, AppError> {
    let bookings = state.bookings.list_flight_bookings(flight_id).await?;
    Ok(Json(FlightBookingsResponse { bookings }))
}
