use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use rotor_core::booking::{BookingConfirmation, CreateBookingRequest};
use rotor_core::models::{Booking, BookingDetail, PassengerInput};
use rotor_core::validation::CapacityShortfall;
use rotor_shared::Masked;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ValidateBookingRequest {
    pub flight_id: Uuid,
    #[serde(default)]
    pub passengers: Vec<PassengerInput>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBookingResponse {
    pub can_book: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seats: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_weight: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_capacity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_weight: Option<Decimal>,
    pub message: String,
}

impl ValidateBookingResponse {
    fn shortfall(shortfall: CapacityShortfall) -> Self {
        let mut response = Self {
            can_book: false,
            reason: Some(shortfall.reason()),
            remaining_seats: None,
            remaining_weight: None,
            remaining_capacity: None,
            requested_weight: None,
            message: shortfall.to_string(),
        };
        match shortfall {
            CapacityShortfall::PassengerLimit { remaining_seats, .. } => {
                response.remaining_seats = Some(remaining_seats);
            }
            CapacityShortfall::WeightLimit { remaining_weight_kg, requested_weight_kg } => {
                response.remaining_capacity = Some(remaining_weight_kg);
                response.requested_weight = Some(requested_weight_kg);
            }
        }
        response
    }
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking: BookingConfirmation,
}

#[derive(Debug, Serialize)]
pub struct BookingLookupResponse {
    pub booking: BookingDetail,
}

#[derive(Debug, Serialize)]
pub struct BookingUpdateResponse {
    pub success: bool,
    pub booking: Booking,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings/validate", post(validate_booking))
        .route("/api/bookings/create", post(create_booking))
        .route("/api/bookings/by-reference/{reference}", get(get_by_reference))
        .route("/api/bookings/{id}/check-in", post(check_in))
        .route("/api/bookings/{id}/cancel", post(cancel_booking))
}

/// POST /api/bookings/validate
/// Pre-check against committed totals; a shortfall is a normal 200 answer
async fn validate_booking(
    State(state): State<AppState>,
    Json(req): Json<ValidateBookingRequest>,
) -> Result<Json<ValidateBookingResponse>, AppError> {
    let response = match state.bookings.validate_booking(req.flight_id, &req.passengers).await? {
        Ok(fit) => ValidateBookingResponse {
            can_book: true,
            reason: None,
            remaining_seats: Some(fit.remaining_seats),
            remaining_weight: Some(fit.remaining_weight_kg),
            remaining_capacity: None,
            requested_weight: None,
            message: "Booking can be accommodated".to_string(),
        },
        Err(shortfall) => ValidateBookingResponse::shortfall(shortfall),
    };
    Ok(Json(response))
}

/// POST /api/bookings/create
async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    info!(
        "Booking request for flight {} from {} ({} passenger(s))",
        req.flight_id,
        Masked(req.contact.email.as_str()),
        req.passengers.len()
    );

    let booking = state.bookings.create_booking(req).await?;
    Ok(Json(CreateBookingResponse { success: true, booking }))
}

/// GET /api/bookings/by-reference/{reference}
async fn get_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<BookingLookupResponse>, AppError> {
    let booking = state.bookings.get_booking_by_reference(&reference).await?;
    Ok(Json(BookingLookupResponse { booking }))
}

/// POST /api/bookings/{id}/check-in
async fn check_in(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingUpdateResponse>, AppError> {
    let booking = state.bookings.check_in(booking_id).await?;
    Ok(Json(BookingUpdateResponse { success: true, booking }))
}

/// POST /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingUpdateResponse>, AppError> {
    let booking = state.bookings.cancel_booking(booking_id).await?;
    Ok(Json(BookingUpdateResponse { success: true, booking }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_shortfall_uses_camel_case_fields() {
        let response = ValidateBookingResponse::shortfall(CapacityShortfall::PassengerLimit {
            remaining_seats: 1,
            requested_seats: 2,
        });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["canBook"], false);
        assert_eq!(json["reason"], "passenger_limit");
        assert_eq!(json["remainingSeats"], 1);
        assert_eq!(json["message"], "Not enough seats available. 1 seat(s) remaining.");
        assert!(json.get("remainingCapacity").is_none());
    }

    #[test]
    fn test_weight_shortfall_reports_capacity_and_request() {
        let response = ValidateBookingResponse::shortfall(CapacityShortfall::WeightLimit {
            remaining_weight_kg: Decimal::from(60),
            requested_weight_kg: Decimal::from(90),
        });

        assert_eq!(response.reason, Some("weight_limit"));
        assert_eq!(response.remaining_capacity, Some(Decimal::from(60)));
        assert_eq!(response.requested_weight, Some(Decimal::from(90)));
        assert_eq!(response.remaining_seats, None);
    }
}
