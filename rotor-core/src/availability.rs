use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AvailableFlight, Flight, FlightHold, Route};

/// Percentage of `max_passengers` at or below which a flight shows as `low`.
pub const DEFAULT_LOW_AVAILABILITY_PERCENT: u32 = 25;

/// Coarse display bucket derived from seats left after holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityLevel {
    High,
    Low,
    Full,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Availability {
    /// Naive: ignores holds. Shown to browsers.
    pub remaining_seats: u32,
    pub remaining_weight_kg: Decimal,
    pub held_seats: u32,
    /// Pessimistic: committed seats and active holds removed. Gates new holds.
    pub actual_available_seats: u32,
    pub availability_level: AvailabilityLevel,
}

/// Derives a flight's capacity view from committed totals plus active holds.
///
/// Holds with `expires_at <= now` are ignored even when the caller hands them
/// in, so correctness never depends on the sweep having run. A hold owned by
/// `exclude_session` is left out of `held_seats`; hold creation uses this so a
/// session re-selecting a flight is not blocked by the hold it is replacing.
pub fn calculate(
    flight: &Flight,
    holds: &[FlightHold],
    now: DateTime<Utc>,
    exclude_session: Option<&str>,
    low_percent: u32,
) -> Availability {
    let held_seats: u32 = holds
        .iter()
        .filter(|h| h.flight_id == flight.id && h.is_active(now))
        .filter(|h| exclude_session != Some(h.session_id.as_str()))
        .map(|h| h.passenger_count)
        .sum();

    let remaining_seats = flight.remaining_seats();
    let actual_available_seats = remaining_seats.saturating_sub(held_seats);

    let availability_level = if !flight.status.is_open_for_booking() || flight.max_passengers == 0 {
        AvailabilityLevel::None
    } else if actual_available_seats == 0 {
        AvailabilityLevel::Full
    } else if u64::from(actual_available_seats) * 100
        <= u64::from(flight.max_passengers) * u64::from(low_percent)
    {
        AvailabilityLevel::Low
    } else {
        AvailabilityLevel::High
    };

    Availability {
        remaining_seats,
        remaining_weight_kg: flight.remaining_weight_kg(),
        held_seats,
        actual_available_seats,
        availability_level,
    }
}

/// Joins a flight with its route and computed availability for the public listing.
pub fn available_flight(flight: Flight, route: Route, availability: Availability) -> AvailableFlight {
    AvailableFlight {
        flight,
        route_name: route.name,
        origin: route.origin,
        destination: route.destination,
        duration_minutes: route.duration_minutes,
        base_price: route.base_price,
        remaining_seats: availability.remaining_seats,
        held_seats: availability.held_seats,
        actual_available_seats: availability.actual_available_seats,
        remaining_weight_kg: availability.remaining_weight_kg,
        availability_level: availability.availability_level,
    }
}
