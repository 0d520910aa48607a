//! Booking validation policy.
//!
//! Pure checks shared by the pre-check endpoint and the commit path. The commit
//! re-runs them against freshly read totals; it never trusts an earlier result.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::models::{CustomerContact, Flight, PassengerInput};
use crate::{CoreError, CoreResult};

pub const MIN_PASSENGER_WEIGHT_KG: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
pub const MAX_PASSENGER_WEIGHT_KG: Decimal = Decimal::from_parts(200, 0, 0, false, 0);
/// Weights are stored as NUMERIC(6,2); finer precision would be rounded away.
pub const WEIGHT_DECIMAL_PLACES: u32 = 2;

/// Why a booking does not fit. Seats are always checked before weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CapacityShortfall {
    PassengerLimit {
        remaining_seats: u32,
        requested_seats: u32,
    },
    WeightLimit {
        remaining_weight_kg: Decimal,
        requested_weight_kg: Decimal,
    },
}

impl CapacityShortfall {
    /// Structured reason code: `passenger_limit` or `weight_limit`.
    pub fn reason(&self) -> &'static str {
        match self {
            CapacityShortfall::PassengerLimit { .. } => "passenger_limit",
            CapacityShortfall::WeightLimit { .. } => "weight_limit",
        }
    }
}

impl fmt::Display for CapacityShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityShortfall::PassengerLimit { remaining_seats, .. } => write!(
                f,
                "Not enough seats available. {} seat(s) remaining.",
                remaining_seats
            ),
            CapacityShortfall::WeightLimit { remaining_weight_kg, .. } => write!(
                f,
                "Total weight exceeds flight capacity. {}kg available.",
                remaining_weight_kg.round_dp(1)
            ),
        }
    }
}

/// Seats and weight that would remain after the booking is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityFit {
    pub remaining_seats: u32,
    pub remaining_weight_kg: Decimal,
}

pub fn total_weight(passengers: &[PassengerInput]) -> Decimal {
    passengers.iter().map(|p| p.weight_kg).sum()
}

pub fn validate_passengers(passengers: &[PassengerInput]) -> CoreResult<()> {
    if passengers.is_empty() {
        return Err(CoreError::InvalidInput("At least one passenger is required".to_string()));
    }

    for (index, passenger) in passengers.iter().enumerate() {
        if passenger.name.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Passenger {} is missing a name",
                index + 1
            )));
        }
        if passenger.weight_kg < MIN_PASSENGER_WEIGHT_KG
            || passenger.weight_kg > MAX_PASSENGER_WEIGHT_KG
        {
            return Err(CoreError::InvalidInput(format!(
                "Passenger {} weight must be between {} and {} kg",
                index + 1,
                MIN_PASSENGER_WEIGHT_KG,
                MAX_PASSENGER_WEIGHT_KG
            )));
        }
        if passenger.weight_kg.normalize().scale() > WEIGHT_DECIMAL_PLACES {
            return Err(CoreError::InvalidInput(format!(
                "Passenger {} weight must have at most {} decimal places",
                index + 1,
                WEIGHT_DECIMAL_PLACES
            )));
        }
    }

    Ok(())
}

pub fn validate_contact(contact: &CustomerContact) -> CoreResult<()> {
    let missing: Vec<&str> = [
        ("customer_name", &contact.name),
        ("customer_email", &contact.email),
        ("customer_phone", &contact.phone),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Checks `passenger_count` more passengers weighing `weight_kg` against the
/// flight's committed totals. Passenger count first, then weight.
pub fn check_capacity(
    flight: &Flight,
    passenger_count: u32,
    weight_kg: Decimal,
) -> Result<CapacityFit, CapacityShortfall> {
    let remaining_seats = flight.remaining_seats();
    if u64::from(flight.current_passengers) + u64::from(passenger_count)
        > u64::from(flight.max_passengers)
    {
        return Err(CapacityShortfall::PassengerLimit {
            remaining_seats,
            requested_seats: passenger_count,
        });
    }

    if flight.current_weight_kg + weight_kg > flight.max_weight_kg {
        return Err(CapacityShortfall::WeightLimit {
            remaining_weight_kg: flight.max_weight_kg - flight.current_weight_kg,
            requested_weight_kg: weight_kg,
        });
    }

    Ok(CapacityFit {
        remaining_seats: remaining_seats - passenger_count,
        remaining_weight_kg: flight.max_weight_kg - flight.current_weight_kg - weight_kg,
    })
}

/// Full policy for a list of passengers: input rules, then capacity.
pub fn check_booking(
    flight: &Flight,
    passengers: &[PassengerInput],
) -> CoreResult<Result<CapacityFit, CapacityShortfall>> {
    validate_passengers(passengers)?;
    let count = u32::try_from(passengers.len())
        .map_err(|_| CoreError::InvalidInput("Too many passengers".to_string()))?;
    Ok(check_capacity(flight, count, total_weight(passengers)))
}
