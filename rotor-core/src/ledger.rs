use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{CapacityTotals, Flight};
use crate::repository::FlightRepository;
use crate::validation::{check_capacity, CapacityShortfall};
use crate::{CoreError, CoreResult};

/// Upper bound on compare-and-swap rounds for one ledger write.
///
/// A round is only lost when another writer changed the totals, so under
/// normal contention this is never reached.
pub const MAX_LEDGER_ATTEMPTS: usize = 32;

/// Authoritative committed capacity per flight.
///
/// Every write is a compare-and-swap on the flight's current totals: read,
/// check against the maxima, then write only if nobody changed the row in
/// between. A lost round re-reads and re-validates.
#[derive(Clone)]
pub struct CapacityLedger {
    flights: Arc<dyn FlightRepository>,
}

impl CapacityLedger {
    pub fn new(flights: Arc<dyn FlightRepository>) -> Self {
        Self { flights }
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> CoreResult<Flight> {
        self.flights
            .get_flight(flight_id)
            .await?
            .ok_or(CoreError::FlightNotFound(flight_id))
    }

    /// Adds a committed booking's seats and weight to the flight.
    pub async fn apply_commit(
        &self,
        flight_id: Uuid,
        passenger_delta: u32,
        weight_delta: Decimal,
    ) -> CoreResult<Flight> {
        for attempt in 1..=MAX_LEDGER_ATTEMPTS {
            let mut flight = self.get_flight(flight_id).await?;
            let expected = flight.totals();

            check_capacity(&flight, passenger_delta, weight_delta)
                .map_err(CoreError::CapacityExceeded)?;

            let new = CapacityTotals {
                passengers: expected.passengers + passenger_delta,
                weight_kg: expected.weight_kg + weight_delta,
            };

            if self
                .flights
                .conditional_update_flight_totals(flight_id, expected, new)
                .await?
            {
                flight.current_passengers = new.passengers;
                flight.current_weight_kg = new.weight_kg;
                info!(
                    "Ledger commit on flight {}: +{} pax, +{}kg -> {}/{} pax, {}/{}kg",
                    flight_id,
                    passenger_delta,
                    weight_delta,
                    new.passengers,
                    flight.max_passengers,
                    new.weight_kg,
                    flight.max_weight_kg
                );
                return Ok(flight);
            }

            warn!("Ledger CAS lost on flight {} (attempt {}), re-validating", flight_id, attempt);
        }

        // Contention never settled; report the freshest shortfall we can see.
        let flight = self.get_flight(flight_id).await?;
        let shortfall = check_capacity(&flight, passenger_delta, weight_delta).err().unwrap_or(
            CapacityShortfall::PassengerLimit {
                remaining_seats: flight.remaining_seats(),
                requested_seats: passenger_delta,
            },
        );
        Err(CoreError::CapacityExceeded(shortfall))
    }

    /// Removes seats and weight previously applied by `apply_commit`.
    ///
    /// Saturates at zero. Callers guarantee at most one rollback per booking.
    pub async fn apply_rollback(
        &self,
        flight_id: Uuid,
        passenger_delta: u32,
        weight_delta: Decimal,
    ) -> CoreResult<Flight> {
        for attempt in 1..=MAX_LEDGER_ATTEMPTS {
            let mut flight = self.get_flight(flight_id).await?;
            let expected = flight.totals();
            let new = CapacityTotals {
                passengers: expected.passengers.saturating_sub(passenger_delta),
                weight_kg: (expected.weight_kg - weight_delta).max(Decimal::ZERO),
            };

            if self
                .flights
                .conditional_update_flight_totals(flight_id, expected, new)
                .await?
            {
                flight.current_passengers = new.passengers;
                flight.current_weight_kg = new.weight_kg;
                info!(
                    "Ledger rollback on flight {}: -{} pax, -{}kg",
                    flight_id, passenger_delta, weight_delta
                );
                return Ok(flight);
            }

            warn!("Ledger rollback CAS lost on flight {} (attempt {})", flight_id, attempt);
        }

        Err(CoreError::InternalCommitFailure(format!(
            "could not roll back {} pax / {}kg on flight {} after {} attempts",
            passenger_delta, weight_delta, flight_id, MAX_LEDGER_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{sample_flight, InMemoryStore};

    #[tokio::test]
    async fn test_commit_and_rollback_adjust_totals() {
        let store = Arc::new(InMemoryStore::new());
        let flight = sample_flight(4, Decimal::from(400));
        store.add_flight(flight.clone()).await;
        let ledger = CapacityLedger::new(store.clone());

        let after = ledger.apply_commit(flight.id, 3, Decimal::from(240)).await.unwrap();
        assert_eq!(after.current_passengers, 3);
        assert_eq!(after.current_weight_kg, Decimal::from(240));

        let back = ledger.apply_rollback(flight.id, 3, Decimal::from(240)).await.unwrap();
        assert_eq!(back.totals(), flight.totals());
    }

    #[tokio::test]
    async fn test_commit_over_capacity_leaves_totals_untouched() {
        let store = Arc::new(InMemoryStore::new());
        let flight = sample_flight(2, Decimal::from(400));
        store.add_flight(flight.clone()).await;
        let ledger = CapacityLedger::new(store.clone());

        let err = ledger.apply_commit(flight.id, 3, Decimal::from(150)).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::CapacityExceeded(CapacityShortfall::PassengerLimit { remaining_seats: 2, .. })
        ));
        assert_eq!(ledger.get_flight(flight.id).await.unwrap().current_passengers, 0);
    }

    #[tokio::test]
    async fn test_unknown_flight() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = CapacityLedger::new(store);
        let id = Uuid::new_v4();
        assert!(matches!(
            ledger.apply_commit(id, 1, Decimal::from(80)).await,
            Err(CoreError::FlightNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_never_overshoot() {
        let store = Arc::new(InMemoryStore::new());
        let flight = sample_flight(5, Decimal::from(1000));
        store.add_flight(flight.clone()).await;
        let ledger = CapacityLedger::new(store.clone());

        let mut handles = Vec::new();
        for _ in 0..12 {
            let ledger = ledger.clone();
            let id = flight.id;
            handles.push(tokio::spawn(async move {
                ledger.apply_commit(id, 1, Decimal::from(75)).await
            }));
        }

        let mut committed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(CoreError::CapacityExceeded(_)) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(committed, 5);
        assert_eq!(rejected, 7);
        let final_flight = ledger.get_flight(flight.id).await.unwrap();
        assert_eq!(final_flight.current_passengers, 5);
        assert_eq!(final_flight.current_weight_kg, Decimal::from(375));
    }
}
