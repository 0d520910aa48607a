use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use rotor_core::repository::RepositoryError;
use rotor_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    Anyhow(anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

fn internal(detail: impl std::fmt::Display) -> (StatusCode, Value) {
    tracing::error!("Internal Server Error: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "Internal Server Error" }),
    )
}

fn core_response(err: CoreError) -> (StatusCode, Value) {
    match err {
        CoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        CoreError::FlightNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": "Flight not found" }))
        }
        CoreError::BookingNotFound(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": "Booking not found" }))
        }
        e @ CoreError::FlightNotOpen { .. } => {
            (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() }))
        }
        CoreError::InsufficientCapacity { requested, available } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Not enough seats available",
                "requested": requested,
                "actual_available": available,
            }),
        ),
        CoreError::CapacityExceeded(shortfall) => {
            // {"reason": ..., "remaining_...": ...} plus the readable message.
            let mut body = serde_json::to_value(shortfall).unwrap_or_else(|_| json!({}));
            if let Value::Object(fields) = &mut body {
                fields.insert("error".to_string(), Value::String(shortfall.to_string()));
            }
            (StatusCode::BAD_REQUEST, body)
        }
        e @ CoreError::InvalidTransition { .. } => {
            (StatusCode::CONFLICT, json!({ "error": e.to_string() }))
        }
        CoreError::Repository(RepositoryError::NotFound(what)) => {
            (StatusCode::NOT_FOUND, json!({ "error": format!("Not found: {}", what) }))
        }
        e @ (CoreError::InternalCommitFailure(_) | CoreError::Repository(_)) => internal(e),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Core(err) => core_response(err),
            AppError::Anyhow(err) => internal(err),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_core::models::BookingStatus;
    use rotor_core::validation::CapacityShortfall;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CoreError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::FlightNotFound(uuid::Uuid::new_v4()), StatusCode::NOT_FOUND),
            (CoreError::BookingNotFound("HT-X".into()), StatusCode::NOT_FOUND),
            (
                CoreError::InsufficientCapacity { requested: 2, available: 1 },
                StatusCode::BAD_REQUEST,
            ),
            (
                CoreError::InvalidTransition {
                    from: BookingStatus::Completed,
                    to: BookingStatus::CheckedIn,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::InternalCommitFailure("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                CoreError::Repository(RepositoryError::Backend("pool closed".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_capacity_body_carries_remaining_capacity() {
        let (status, body) = core_response(CoreError::CapacityExceeded(
            CapacityShortfall::WeightLimit {
                remaining_weight_kg: Decimal::new(455, 1),
                requested_weight_kg: Decimal::from(90),
            },
        ));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "weight_limit");
        assert_eq!(body["error"], "Total weight exceeds flight capacity. 45.5kg available.");
        assert!(body.get("remaining_weight_kg").is_some());
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let (_, body) = core_response(CoreError::InternalCommitFailure("db password wrong".into()));
        assert_eq!(body["error"], "Internal Server Error");
    }
}
