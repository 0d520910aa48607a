use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::availability::AvailabilityLevel;

/// Error returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

/// Flight lifecycle: scheduled → confirmed → completed, or cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

text_enum!(FlightStatus, "flight status", {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl FlightStatus {
    /// Only scheduled and confirmed flights accept holds and bookings.
    pub fn is_open_for_booking(&self) -> bool {
        matches!(self, FlightStatus::Scheduled | FlightStatus::Confirmed)
    }
}

/// Channel a booking was taken through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingType {
    #[default]
    Online,
    Phone,
    #[serde(rename = "walkin")]
    WalkIn,
}

text_enum!(BookingType, "booking type", {
    Online => "online",
    Phone => "phone",
    WalkIn => "walkin",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Refunded => "refunded",
});

/// Booking lifecycle: pending → confirmed → checked_in → completed, or cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
}

text_enum!(BookingStatus, "booking status", {
    Pending => "pending",
    Confirmed => "confirmed",
    CheckedIn => "checked_in",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    pub fn can_check_in(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn can_cancel(&self) -> bool {
        !matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: Uuid,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub duration_minutes: i32,
    pub base_price: Decimal,
}

/// Committed seat and weight totals of a flight; the value compared in CAS writes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityTotals {
    pub passengers: u32,
    pub weight_kg: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: Uuid,
    pub route_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub max_passengers: u32,
    pub max_weight_kg: Decimal,
    pub current_passengers: u32,
    pub current_weight_kg: Decimal,
    pub status: FlightStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flight {
    pub fn totals(&self) -> CapacityTotals {
        CapacityTotals {
            passengers: self.current_passengers,
            weight_kg: self.current_weight_kg,
        }
    }

    /// Seats left ignoring holds.
    pub fn remaining_seats(&self) -> u32 {
        self.max_passengers.saturating_sub(self.current_passengers)
    }

    /// Weight left; never held, so this is the only weight figure.
    pub fn remaining_weight_kg(&self) -> Decimal {
        (self.max_weight_kg - self.current_weight_kg).max(Decimal::ZERO)
    }
}

/// Provisional, time-boxed claim on a flight's seats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightHold {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub session_id: String,
    pub passenger_count: u32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FlightHold {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub flight_id: Uuid,
    pub booking_reference: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub passenger_count: u32,
    pub total_weight_kg: Decimal,
    pub booking_type: BookingType,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub qr_code: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passenger {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub name: String,
    pub weight_kg: Decimal,
    pub seat_number: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Passenger as submitted by a client, before it belongs to a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerInput {
    pub name: String,
    pub weight_kg: Decimal,
}

/// Customer contact as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CustomerContact {
    #[serde(default, rename = "customer_name")]
    pub name: String,
    #[serde(default, rename = "customer_email")]
    pub email: String,
    #[serde(default, rename = "customer_phone")]
    pub phone: String,
}

/// Flight joined with its route and derived availability.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailableFlight {
    #[serde(flatten)]
    pub flight: Flight,
    pub route_name: String,
    pub origin: String,
    pub destination: String,
    pub duration_minutes: i32,
    pub base_price: Decimal,
    pub remaining_seats: u32,
    pub held_seats: u32,
    pub actual_available_seats: u32,
    pub remaining_weight_kg: Decimal,
    pub availability_level: AvailabilityLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassengerSummary {
    pub name: String,
    pub weight_kg: Decimal,
    pub seat_number: Option<i32>,
}

impl From<&Passenger> for PassengerSummary {
    fn from(p: &Passenger) -> Self {
        Self {
            name: p.name.clone(),
            weight_kg: p.weight_kg,
            seat_number: p.seat_number,
        }
    }
}

/// Booking with the flight and route context a confirmation page or manifest needs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub route_name: String,
    pub origin: String,
    pub destination: String,
    pub duration_minutes: i32,
    pub base_price: Decimal,
    pub passengers: Vec<PassengerSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip_matches_serde() {
        assert_eq!(BookingStatus::CheckedIn.as_str(), "checked_in");
        assert_eq!("checked_in".parse::<BookingStatus>(), Ok(BookingStatus::CheckedIn));
        assert_eq!(
            serde_json::to_string(&BookingType::WalkIn).unwrap(),
            "\"walkin\""
        );
        assert_eq!("walkin".parse::<BookingType>(), Ok(BookingType::WalkIn));

        let err = "boarding".parse::<BookingStatus>().unwrap_err();
        assert_eq!(err.kind, "booking status");
    }

    #[test]
    fn test_booking_transitions() {
        assert!(BookingStatus::Pending.can_check_in());
        assert!(BookingStatus::Confirmed.can_check_in());
        assert!(!BookingStatus::Cancelled.can_check_in());
        assert!(BookingStatus::CheckedIn.can_cancel());
        assert!(!BookingStatus::Completed.can_cancel());
        assert!(!FlightStatus::Cancelled.is_open_for_booking());
    }

    #[test]
    fn test_contact_uses_customer_field_names() {
        let json = r#"{"customer_name":"Ana","customer_email":"ana@example.com","customer_phone":"555"}"#;
        let contact: CustomerContact = serde_json::from_str(json).unwrap();
        assert_eq!(contact.name, "Ana");
        assert_eq!(contact.phone, "555");
    }
}
