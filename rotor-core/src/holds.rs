use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::availability::{self, Availability, DEFAULT_LOW_AVAILABILITY_PERCENT};
use crate::models::{AvailableFlight, Flight, FlightHold};
use crate::repository::{FlightRepository, HoldRepository, HoldWrite};
use crate::{CoreError, CoreResult};

/// Default hold lifetime: 15 minutes.
pub const DEFAULT_HOLD_TTL_SECONDS: u64 = 15 * 60;
/// Longest hold lifetime a policy can grant: one day.
pub const MAX_HOLD_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Operator-level hold settings. Clients never choose the TTL.
#[derive(Debug, Clone, Copy)]
pub struct HoldPolicy {
    pub ttl_seconds: u64,
    pub low_availability_percent: u32,
}

impl HoldPolicy {
    /// Hold lifetime, clamped to `MAX_HOLD_TTL_SECONDS`.
    pub fn ttl(&self) -> Duration {
        let seconds = self.ttl_seconds.min(MAX_HOLD_TTL_SECONDS);
        Duration::seconds(i64::try_from(seconds).unwrap_or(0))
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_HOLD_TTL_SECONDS,
            low_availability_percent: DEFAULT_LOW_AVAILABILITY_PERCENT,
        }
    }
}

/// Creates, supersedes, releases and sweeps time-boxed seat holds.
///
/// Expiry is passive: a hold stops counting the moment `expires_at` passes,
/// whether or not it has been physically deleted.
#[derive(Clone)]
pub struct HoldManager {
    flights: Arc<dyn FlightRepository>,
    holds: Arc<dyn HoldRepository>,
    policy: HoldPolicy,
}

impl HoldManager {
    pub fn new(
        flights: Arc<dyn FlightRepository>,
        holds: Arc<dyn HoldRepository>,
        policy: HoldPolicy,
    ) -> Self {
        Self { flights, holds, policy }
    }

    pub fn policy(&self) -> HoldPolicy {
        self.policy
    }

    /// Reserves `passenger_count` seats for the session, replacing any hold it
    /// already has on this flight.
    pub async fn create_hold(
        &self,
        flight_id: Uuid,
        session_id: &str,
        passenger_count: u32,
    ) -> CoreResult<FlightHold> {
        if session_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("Session ID required".to_string()));
        }
        if passenger_count == 0 {
            return Err(CoreError::InvalidInput(
                "passenger_count must be at least 1".to_string(),
            ));
        }

        self.sweep_expired().await?;

        let flight = self
            .flights
            .get_flight(flight_id)
            .await?
            .ok_or(CoreError::FlightNotFound(flight_id))?;
        if !flight.status.is_open_for_booking() {
            return Err(CoreError::FlightNotOpen { flight_id, status: flight.status });
        }

        let now = Utc::now();
        let hold = FlightHold {
            id: Uuid::new_v4(),
            flight_id,
            session_id: session_id.to_string(),
            passenger_count,
            expires_at: now + self.policy.ttl(),
            created_at: now,
        };

        // The session's current hold is about to be superseded, so the store
        // leaves it out when counting held seats.
        let hold = match self.holds.place_hold(&hold).await? {
            HoldWrite::Placed(hold) => hold,
            HoldWrite::Insufficient { available } => {
                warn!(
                    "Hold rejected on flight {}: requested {}, available {}",
                    flight_id, passenger_count, available
                );
                return Err(CoreError::InsufficientCapacity {
                    requested: passenger_count,
                    available,
                });
            }
        };
        info!(
            "Hold {} created: flight {} session {} x{} until {}",
            hold.id, flight_id, session_id, passenger_count, hold.expires_at
        );
        Ok(hold)
    }

    /// Drops the session's hold, optionally only on one flight. Idempotent.
    pub async fn release_hold(&self, session_id: &str, flight_id: Option<Uuid>) -> CoreResult<u64> {
        if session_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("Session ID required".to_string()));
        }

        let released = self.holds.delete_hold(session_id, flight_id).await?;
        debug!("Released {} hold(s) for session {}", released, session_id);
        Ok(released)
    }

    /// Physically deletes expired holds. Hygiene only.
    pub async fn sweep_expired(&self) -> CoreResult<u64> {
        let removed = self.holds.delete_expired_holds(Utc::now()).await?;
        if removed > 0 {
            debug!("Swept {} expired hold(s)", removed);
        }
        Ok(removed)
    }

    /// Current capacity view of a flight, active holds subtracted.
    pub async fn availability(
        &self,
        flight: &Flight,
        exclude_session: Option<&str>,
    ) -> CoreResult<Availability> {
        let now = Utc::now();
        let holds = self.holds.read_active_holds(flight.id, now).await?;
        Ok(availability::calculate(
            flight,
            &holds,
            now,
            exclude_session,
            self.policy.low_availability_percent,
        ))
    }

    /// Upcoming bookable flights with route details and availability.
    pub async fn available_flights(&self, limit: u32) -> CoreResult<Vec<AvailableFlight>> {
        let rows = self.flights.list_open_flights(limit).await?;
        let mut listing = Vec::with_capacity(rows.len());
        for (flight, route) in rows {
            let available = self.availability(&flight, None).await?;
            listing.push(availability::available_flight(flight, route, available));
        }
        Ok(listing)
    }
}
