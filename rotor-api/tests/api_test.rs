use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use rotor_api::{app, AppState};
use rotor_core::memory::{sample_flight, sample_route, InMemoryStore};
use rotor_core::models::Flight;
use rotor_store::app_config::BusinessRules;

async fn setup(max_passengers: u32, max_weight_kg: i64) -> (Router, Arc<InMemoryStore>, Flight) {
    let store = Arc::new(InMemoryStore::new());
    let route = sample_route();
    let mut flight = sample_flight(max_passengers, Decimal::from(max_weight_kg));
    flight.route_id = route.id;
    store.add_route(route).await;
    store.add_flight(flight.clone()).await;

    let state = AppState::new(store.clone(), store.clone(), store.clone(), BusinessRules::default());
    (app(state), store, flight)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn booking_body(flight: &Flight, weights: &[i64], session: Option<&str>) -> Value {
    let passengers: Vec<Value> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| json!({ "name": format!("Passenger {}", i + 1), "weight_kg": w }))
        .collect();
    json!({
        "flight_id": flight.id,
        "customer_name": "Keoni Kahale",
        "customer_email": "keoni@example.com",
        "customer_phone": "808-555-0142",
        "passengers": passengers,
        "session_id": session,
    })
}

#[tokio::test]
async fn test_health() {
    let (router, _, _) = setup(4, 400).await;
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_hold_then_book_flow() {
    let (router, store, flight) = setup(4, 400).await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/holds/create",
        Some(json!({ "flight_id": flight.id, "session_id": "sess-a", "passenger_count": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["expires_in_seconds"], 900);
    assert_eq!(body["hold"]["passenger_count"], 3);

    let (status, body) = send(
        &router,
        "POST",
        "/api/holds/create",
        Some(json!({ "flight_id": flight.id, "session_id": "sess-b", "passenger_count": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["actual_available"], 1);

    let (_, listing) = send(&router, "GET", "/api/flights", None).await;
    let listed = &listing["flights"][0];
    assert_eq!(listed["held_seats"], 3);
    assert_eq!(listed["actual_available_seats"], 1);
    assert_eq!(listed["remaining_seats"], 4);

    let (status, body) = send(
        &router,
        "POST",
        "/api/bookings/create",
        Some(booking_body(&flight, &[70, 80, 90], Some("sess-a"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reference = body["booking"]["booking_reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("HT-"));
    assert_eq!(body["booking"]["qr_code"], format!("QR-{}", reference));

    // The committing session's hold is gone once the booking lands.
    assert!(store.all_holds().await.is_empty());

    let (status, body) = send(
        &router,
        "POST",
        "/api/bookings/create",
        Some(booking_body(&flight, &[60, 60], None)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "passenger_limit");
    assert_eq!(body["remaining_seats"], 1);

    let (status, body) =
        send(&router, "GET", &format!("/api/bookings/by-reference/{}", reference), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["passengers"].as_array().unwrap().len(), 3);
    assert_eq!(body["booking"]["status"], "pending");
}

#[tokio::test]
async fn test_validate_reports_can_book_in_camel_case() {
    let (router, _, flight) = setup(4, 400).await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/bookings/validate",
        Some(json!({
            "flight_id": flight.id,
            "passengers": [{ "name": "A", "weight_kg": 150 }, { "name": "B", "weight_kg": 150 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canBook"], true);
    assert_eq!(body["remainingSeats"], 2);

    let (status, body) = send(
        &router,
        "POST",
        "/api/bookings/validate",
        Some(json!({
            "flight_id": flight.id,
            "passengers": [
                { "name": "A", "weight_kg": 150 },
                { "name": "B", "weight_kg": 150 },
                { "name": "C", "weight_kg": 150 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canBook"], false);
    assert_eq!(body["reason"], "weight_limit");
    assert_eq!(body["message"], "Total weight exceeds flight capacity. 400kg available.");

    let (status, _) = send(
        &router,
        "POST",
        "/api/bookings/validate",
        Some(json!({ "flight_id": flight.id, "passengers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_flight_is_404() {
    let (router, _, _) = setup(4, 400).await;
    let (status, _) = send(
        &router,
        "POST",
        "/api/holds/create",
        Some(json!({
            "flight_id": uuid::Uuid::new_v4(),
            "session_id": "sess",
            "passenger_count": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_release_requires_session() {
    let (router, _, flight) = setup(4, 400).await;

    let (status, _) = send(
        &router,
        "POST",
        "/api/holds/release",
        Some(json!({ "flight_id": flight.id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        "POST",
        "/api/holds/release",
        Some(json!({ "session_id": "never-held" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_check_in_cancel_and_manifest() {
    let (router, store, flight) = setup(6, 600).await;

    let (_, body) = send(
        &router,
        "POST",
        "/api/bookings/create",
        Some(booking_body(&flight, &[75, 85], None)),
    )
    .await;
    let first = body["booking"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(
        &router,
        "POST",
        "/api/bookings/create",
        Some(booking_body(&flight, &[65], None)),
    )
    .await;
    let second = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, body) =
        send(&router, "POST", &format!("/api/bookings/{}/check-in", first), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "checked_in");

    let (status, body) =
        send(&router, "POST", &format!("/api/bookings/{}/cancel", second), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");

    let (status, _) =
        send(&router, "POST", &format!("/api/bookings/{}/check-in", second), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) =
        send(&router, "GET", &format!("/api/flights/{}/bookings", flight.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let manifest = body["bookings"].as_array().unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0]["id"], first.as_str());

    let stored = rotor_core::repository::FlightRepository::get_flight(store.as_ref(), flight.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_passengers, 2);
    assert_eq!(stored.current_weight_kg, Decimal::from(160));
}

#[tokio::test]
async fn test_unknown_reference_is_404() {
    let (router, _, _) = setup(4, 400).await;
    let (status, body) = send(&router, "GET", "/api/bookings/by-reference/HT-NOPE2345", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Booking not found");
}

#[tokio::test]
async fn test_weight_finer_than_storage_precision_is_rejected() {
    let (router, store, flight) = setup(4, 400).await;

    let mut body = booking_body(&flight, &[70], None);
    body["passengers"][0]["weight_kg"] = json!(70.005);
    let (status, body) = send(&router, "POST", "/api/bookings/create", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("decimal places"));
    assert_eq!(store.booking_count().await, 0);
}
