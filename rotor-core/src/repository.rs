use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, CapacityTotals, Flight, FlightHold, Passenger, PassengerInput, Route,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A booking with this reference already exists; the insert did not overwrite it.
    #[error("Duplicate booking reference: {0}")]
    DuplicateReference(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, PartialEq)]
pub enum HoldWrite {
    Placed(FlightHold),
    Insufficient { available: u32 },
}

/// Committed capacity rows. Totals are written only through the conditional update.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn get_flight(&self, id: Uuid) -> RepositoryResult<Option<Flight>>;

    /// Upcoming flights open for booking with their routes, ordered by date then time.
    async fn list_open_flights(&self, limit: u32) -> RepositoryResult<Vec<(Flight, Route)>>;

    async fn get_route(&self, id: Uuid) -> RepositoryResult<Option<Route>>;

    /// Writes `new` only if the stored totals still equal `expected`.
    /// Returns `false` when another writer got there first.
    async fn conditional_update_flight_totals(
        &self,
        id: Uuid,
        expected: CapacityTotals,
        new: CapacityTotals,
    ) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait HoldRepository: Send + Sync {
    /// Holds on the flight with `expires_at > now`.
    async fn read_active_holds(
        &self,
        flight_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<FlightHold>>;

    /// Writes the hold if the flight still has room for it, replacing any hold
    /// for the same (flight, session) in one step.
    ///
    /// Room is `max_passengers - current_passengers` minus the seats of other
    /// sessions' holds active at `hold.created_at`. The check and the write are
    /// atomic per flight, so two sessions cannot both take the last seat.
    async fn place_hold(&self, hold: &FlightHold) -> RepositoryResult<HoldWrite>;

    async fn delete_hold(&self, session_id: &str, flight_id: Option<Uuid>)
        -> RepositoryResult<u64>;

    async fn delete_expired_holds(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Fails with `DuplicateReference` rather than overwrite an existing booking.
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<Booking>;

    async fn insert_passengers(
        &self,
        booking_id: Uuid,
        passengers: &[PassengerInput],
    ) -> RepositoryResult<Vec<Passenger>>;

    /// Removes the booking and any passengers linked to it.
    async fn delete_booking(&self, id: Uuid) -> RepositoryResult<()>;

    async fn get_booking(&self, id: Uuid) -> RepositoryResult<Option<Booking>>;

    async fn get_booking_by_reference(&self, reference: &str)
        -> RepositoryResult<Option<Booking>>;

    /// Non-cancelled bookings of a flight, oldest first.
    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> RepositoryResult<Vec<Booking>>;

    async fn list_passengers(&self, booking_id: Uuid) -> RepositoryResult<Vec<Passenger>>;

    /// Status compare-and-swap; `false` if the booking is no longer in `expected`.
    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        new: BookingStatus,
    ) -> RepositoryResult<bool>;

    /// Bookings whose `passenger_count` differs from their linked passenger rows.
    async fn find_orphaned_bookings(&self) -> RepositoryResult<Vec<Booking>>;
}
