//! In-process store implementing every repository trait.
//!
//! Used by the test suites and for running the API without PostgreSQL. All
//! state sits behind one async mutex, so each trait call is atomic the same
//! way a single-row statement is in the database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Booking, BookingStatus, CapacityTotals, Flight, FlightHold, FlightStatus, Passenger,
    PassengerInput, Route,
};
use crate::repository::{
    BookingRepository, FlightRepository, HoldRepository, HoldWrite, RepositoryError,
    RepositoryResult,
};

#[derive(Default)]
struct State {
    routes: HashMap<Uuid, Route>,
    flights: HashMap<Uuid, Flight>,
    holds: HashMap<(Uuid, String), FlightHold>,
    bookings: HashMap<Uuid, Booking>,
    passengers: Vec<Passenger>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_passenger_inserts: AtomicBool,
    fail_booking_deletes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_route(&self, route: Route) {
        self.state.lock().await.routes.insert(route.id, route);
    }

    pub async fn add_flight(&self, flight: Flight) {
        self.state.lock().await.flights.insert(flight.id, flight);
    }

    /// Makes every following `insert_passengers` call fail.
    pub fn fail_passenger_inserts(&self, fail: bool) {
        self.fail_passenger_inserts.store(fail, Ordering::SeqCst);
    }

    /// Makes every following `delete_booking` call fail.
    pub fn fail_booking_deletes(&self, fail: bool) {
        self.fail_booking_deletes.store(fail, Ordering::SeqCst);
    }

    /// Stores a hold as-is, bypassing the capacity check. For seeding.
    pub async fn insert_hold(&self, hold: FlightHold) {
        self.state
            .lock()
            .await
            .holds
            .insert((hold.flight_id, hold.session_id.clone()), hold);
    }

    /// Every stored hold, expired ones included.
    pub async fn all_holds(&self) -> Vec<FlightHold> {
        self.state.lock().await.holds.values().cloned().collect()
    }

    pub async fn booking_count(&self) -> usize {
        self.state.lock().await.bookings.len()
    }

    pub async fn passenger_row_count(&self) -> usize {
        self.state.lock().await.passengers.len()
    }
}

/// Route fixture for tests and local seeding.
pub fn sample_route() -> Route {
    Route {
        id: Uuid::new_v4(),
        name: "Na Pali Coast".to_string(),
        origin: "Lihue".to_string(),
        destination: "Na Pali".to_string(),
        duration_minutes: 55,
        base_price: Decimal::from(329),
    }
}

/// Empty scheduled flight departing tomorrow.
pub fn sample_flight(max_passengers: u32, max_weight_kg: Decimal) -> Flight {
    let now = Utc::now();
    let departure = now + Duration::days(1);
    Flight {
        id: Uuid::new_v4(),
        route_id: Uuid::new_v4(),
        scheduled_date: departure.date_naive(),
        scheduled_time: departure.time(),
        max_passengers,
        max_weight_kg,
        current_passengers: 0,
        current_weight_kg: Decimal::ZERO,
        status: FlightStatus::Scheduled,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn get_flight(&self, id: Uuid) -> RepositoryResult<Option<Flight>> {
        Ok(self.state.lock().await.flights.get(&id).cloned())
    }

    async fn list_open_flights(&self, limit: u32) -> RepositoryResult<Vec<(Flight, Route)>> {
        let today = Utc::now().date_naive();
        let state = self.state.lock().await;

        let mut rows: Vec<(Flight, Route)> = state
            .flights
            .values()
            .filter(|f| f.status.is_open_for_booking() && f.scheduled_date >= today)
            .filter_map(|f| state.routes.get(&f.route_id).map(|r| (f.clone(), r.clone())))
            .collect();

        rows.sort_by(|(a, _), (b, _)| {
            (a.scheduled_date, a.scheduled_time).cmp(&(b.scheduled_date, b.scheduled_time))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn get_route(&self, id: Uuid) -> RepositoryResult<Option<Route>> {
        Ok(self.state.lock().await.routes.get(&id).cloned())
    }

    async fn conditional_update_flight_totals(
        &self,
        id: Uuid,
        expected: CapacityTotals,
        new: CapacityTotals,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.lock().await;
        let flight = state
            .flights
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("flight {id}")))?;

        if flight.totals() != expected {
            return Ok(false);
        }

        flight.current_passengers = new.passengers;
        flight.current_weight_kg = new.weight_kg;
        flight.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl HoldRepository for InMemoryStore {
    async fn read_active_holds(
        &self,
        flight_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<FlightHold>> {
        Ok(self
            .state
            .lock()
            .await
            .holds
            .values()
            .filter(|h| h.flight_id == flight_id && h.is_active(now))
            .cloned()
            .collect())
    }

    async fn place_hold(&self, hold: &FlightHold) -> RepositoryResult<HoldWrite> {
        let mut state = self.state.lock().await;
        let flight = state
            .flights
            .get(&hold.flight_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("flight {}", hold.flight_id)))?;

        let held: u32 = state
            .holds
            .values()
            .filter(|h| {
                h.flight_id == hold.flight_id
                    && h.session_id != hold.session_id
                    && h.is_active(hold.created_at)
            })
            .map(|h| h.passenger_count)
            .sum();
        let available = flight.remaining_seats().saturating_sub(held);
        if hold.passenger_count > available {
            return Ok(HoldWrite::Insufficient { available });
        }

        state
            .holds
            .insert((hold.flight_id, hold.session_id.clone()), hold.clone());
        Ok(HoldWrite::Placed(hold.clone()))
    }

    async fn delete_hold(
        &self,
        session_id: &str,
        flight_id: Option<Uuid>,
    ) -> RepositoryResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.holds.len();
        state.holds.retain(|(held_flight, held_session), _| {
            !(held_session == session_id && flight_id.map_or(true, |f| f == *held_flight))
        });
        Ok((before - state.holds.len()) as u64)
    }

    async fn delete_expired_holds(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.holds.len();
        state.holds.retain(|_, h| h.is_active(now));
        Ok((before - state.holds.len()) as u64)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let mut state = self.state.lock().await;
        if state
            .bookings
            .values()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(RepositoryError::DuplicateReference(booking.booking_reference.clone()));
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn insert_passengers(
        &self,
        booking_id: Uuid,
        passengers: &[PassengerInput],
    ) -> RepositoryResult<Vec<Passenger>> {
        if self.fail_passenger_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("injected passenger insert failure".to_string()));
        }

        let mut state = self.state.lock().await;
        if !state.bookings.contains_key(&booking_id) {
            return Err(RepositoryError::NotFound(format!("booking {booking_id}")));
        }

        let now = Utc::now();
        let rows: Vec<Passenger> = passengers
            .iter()
            .map(|p| Passenger {
                id: Uuid::new_v4(),
                booking_id,
                name: p.name.trim().to_string(),
                weight_kg: p.weight_kg,
                seat_number: None,
                created_at: now,
            })
            .collect();
        state.passengers.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn delete_booking(&self, id: Uuid) -> RepositoryResult<()> {
        if self.fail_booking_deletes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("injected booking delete failure".to_string()));
        }

        let mut state = self.state.lock().await;
        state.bookings.remove(&id);
        state.passengers.retain(|p| p.booking_id != id);
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Booking>> {
        Ok(self
            .state
            .lock()
            .await
            .bookings
            .values()
            .find(|b| b.booking_reference == reference)
            .cloned())
    }

    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.flight_id == flight_id && b.status != BookingStatus::Cancelled)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_passengers(&self, booking_id: Uuid) -> RepositoryResult<Vec<Passenger>> {
        Ok(self
            .state
            .lock()
            .await
            .passengers
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        new: BookingStatus,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.lock().await;
        match state.bookings.get_mut(&id) {
            Some(booking) if booking.status == expected => {
                booking.status = new;
                booking.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("booking {id}"))),
        }
    }

    async fn find_orphaned_bookings(&self) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .values()
            .filter(|b| {
                let linked = state.passengers.iter().filter(|p| p.booking_id == b.id).count();
                linked != b.passenger_count as usize
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(flight_id: Uuid, session: &str, count: u32) -> FlightHold {
        let now = Utc::now();
        FlightHold {
            id: Uuid::new_v4(),
            flight_id,
            session_id: session.to_string(),
            passenger_count: count,
            expires_at: now + Duration::minutes(15),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_place_hold_supersedes_same_session() {
        let store = InMemoryStore::new();
        let flight = sample_flight(4, Decimal::from(400));
        store.add_flight(flight.clone()).await;

        let first = hold(flight.id, "s1", 2);
        assert!(matches!(store.place_hold(&first).await.unwrap(), HoldWrite::Placed(_)));
        // The session's own hold does not count against its replacement.
        let second = hold(flight.id, "s1", 4);
        assert!(matches!(store.place_hold(&second).await.unwrap(), HoldWrite::Placed(_)));

        let active = store.read_active_holds(flight.id, Utc::now()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].passenger_count, 4);
    }

    #[tokio::test]
    async fn test_place_hold_counts_other_sessions_and_skips_expired() {
        let store = InMemoryStore::new();
        let mut flight = sample_flight(5, Decimal::from(400));
        flight.current_passengers = 1;
        store.add_flight(flight.clone()).await;

        let mut expired = hold(flight.id, "gone", 4);
        expired.expires_at = Utc::now() - Duration::seconds(1);
        store.insert_hold(expired).await;
        store.place_hold(&hold(flight.id, "s1", 3)).await.unwrap();

        assert_eq!(
            store.place_hold(&hold(flight.id, "s2", 2)).await.unwrap(),
            HoldWrite::Insufficient { available: 1 }
        );
        assert!(matches!(
            store.place_hold(&hold(flight.id, "s2", 1)).await.unwrap(),
            HoldWrite::Placed(_)
        ));
        assert!(matches!(
            store.place_hold(&hold(Uuid::new_v4(), "s3", 1)).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_hold_scoped_to_flight() {
        let store = InMemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for flight_id in [a, b] {
            store.insert_hold(hold(flight_id, "s1", 1)).await;
        }

        assert_eq!(store.delete_hold("s1", Some(a)).await.unwrap(), 1);
        assert_eq!(store.delete_hold("s1", None).await.unwrap(), 1);
        assert_eq!(store.delete_hold("s1", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_totals_cas_rejects_stale_expectation() {
        let store = InMemoryStore::new();
        let flight = sample_flight(4, Decimal::from(400));
        store.add_flight(flight.clone()).await;

        let stale = flight.totals();
        let bumped = CapacityTotals { passengers: 1, weight_kg: Decimal::from(80) };
        assert!(store.conditional_update_flight_totals(flight.id, stale, bumped).await.unwrap());
        assert!(!store.conditional_update_flight_totals(flight.id, stale, bumped).await.unwrap());
    }
}
