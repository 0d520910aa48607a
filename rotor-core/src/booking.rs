//! Booking commit protocol.
//!
//! A commit walks validated → booking-row-created → passengers-created →
//! committed. The ledger increment is the last write, so a failure in any
//! earlier step only needs the booking row removed. Repeated identical
//! requests are not deduplicated: there is no idempotency key.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use chrono::Utc;
use rotor_shared::Masked;

use crate::holds::HoldManager;
use crate::ledger::CapacityLedger;
use crate::models::{
    Booking, BookingDetail, BookingStatus, BookingType, CustomerContact, PassengerInput,
    PassengerSummary, PaymentStatus,
};
use crate::repository::{BookingRepository, FlightRepository, RepositoryError};
use crate::validation::{self, CapacityFit, CapacityShortfall};
use crate::{CoreError, CoreResult};

pub const DEFAULT_REFERENCE_PREFIX: &str = "HT";
pub const MAX_REFERENCE_ATTEMPTS: usize = 5;
const MAX_STATUS_ATTEMPTS: usize = 8;
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_SUFFIX_LEN: usize = 8;

/// `PREFIX-XXXXXXXX` using an alphabet without look-alike characters.
pub fn generate_reference(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| char::from(REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())]))
        .collect();
    format!("{prefix}-{suffix}")
}

/// Display token rendered as a QR code on the confirmation page.
pub fn display_token(reference: &str) -> String {
    format!("QR-{reference}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub flight_id: Uuid,
    #[serde(flatten)]
    pub contact: CustomerContact,
    #[serde(default)]
    pub passengers: Vec<PassengerInput>,
    #[serde(default)]
    pub booking_type: BookingType,
    #[serde(default)]
    pub notes: Option<String>,
    /// Hold to release once the booking is committed.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingConfirmation {
    pub id: Uuid,
    pub booking_reference: String,
    pub qr_code: String,
}

#[derive(Clone)]
pub struct BookingService {
    ledger: CapacityLedger,
    flights: Arc<dyn FlightRepository>,
    bookings: Arc<dyn BookingRepository>,
    holds: HoldManager,
    reference_prefix: String,
    reference_generator: fn(&str) -> String,
}

impl BookingService {
    pub fn new(
        flights: Arc<dyn FlightRepository>,
        bookings: Arc<dyn BookingRepository>,
        holds: HoldManager,
        reference_prefix: impl Into<String>,
    ) -> Self {
        Self {
            ledger: CapacityLedger::new(flights.clone()),
            flights,
            bookings,
            holds,
            reference_prefix: reference_prefix.into(),
            reference_generator: generate_reference,
        }
    }

    /// Replaces the reference generator; lets tests force collisions.
    pub fn with_reference_generator(mut self, generator: fn(&str) -> String) -> Self {
        self.reference_generator = generator;
        self
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// Pre-check against committed totals. Shortfalls are informational.
    pub async fn validate_booking(
        &self,
        flight_id: Uuid,
        passengers: &[PassengerInput],
    ) -> CoreResult<Result<CapacityFit, CapacityShortfall>> {
        let flight = self.ledger.get_flight(flight_id).await?;
        validation::check_booking(&flight, passengers)
    }

    pub async fn create_booking(&self, req: CreateBookingRequest) -> CoreResult<BookingConfirmation> {
        // 1. Validate against live totals, never a cached pre-check.
        validation::validate_contact(&req.contact)?;
        validation::validate_passengers(&req.passengers)?;

        let flight = self.ledger.get_flight(req.flight_id).await?;
        if !flight.status.is_open_for_booking() {
            return Err(CoreError::FlightNotOpen { flight_id: flight.id, status: flight.status });
        }

        let passenger_count = u32::try_from(req.passengers.len())
            .map_err(|_| CoreError::InvalidInput("Too many passengers".to_string()))?;
        let total_weight = validation::total_weight(&req.passengers);

        if let Err(shortfall) = validation::check_capacity(&flight, passenger_count, total_weight) {
            warn!("Booking rejected on flight {}: {}", flight.id, shortfall);
            return Err(CoreError::CapacityExceeded(shortfall));
        }

        // 2-3. Booking row, status pending.
        let booking = self.insert_booking_row(&req, passenger_count, total_weight).await?;

        // 4-5. Passengers, or compensate.
        if let Err(e) = self.bookings.insert_passengers(booking.id, &req.passengers).await {
            error!("Passenger insert failed for booking {}: {}", booking.id, e);
            self.compensate(&booking).await;
            return Err(CoreError::InternalCommitFailure(format!(
                "Failed to create passenger records: {e}"
            )));
        }

        // 6. Ledger increment, ordered after passenger success.
        if let Err(e) = self
            .ledger
            .apply_commit(booking.flight_id, passenger_count, total_weight)
            .await
        {
            warn!("Ledger commit failed for booking {}: {}", booking.booking_reference, e);
            if !self.compensate(&booking).await {
                return Err(CoreError::InternalCommitFailure(format!(
                    "booking {} could not be removed after ledger failure: {e}",
                    booking.id
                )));
            }
            return Err(e);
        }

        // 7. Best effort: the hold would expire on its own anyway.
        if let Some(session_id) = req.session_id.as_deref().filter(|s| !s.trim().is_empty()) {
            if let Err(e) = self.holds.release_hold(session_id, Some(booking.flight_id)).await {
                warn!("Could not release hold for session {}: {}", session_id, e);
            }
        }

        info!(
            "Booking {} committed on flight {}: {} pax, {}kg, {} channel, contact {}",
            booking.booking_reference,
            booking.flight_id,
            passenger_count,
            total_weight,
            booking.booking_type,
            Masked(booking.customer_email.as_str())
        );

        Ok(BookingConfirmation {
            id: booking.id,
            qr_code: booking.qr_code.clone().unwrap_or_else(|| display_token(&booking.booking_reference)),
            booking_reference: booking.booking_reference,
        })
    }

    async fn insert_booking_row(
        &self,
        req: &CreateBookingRequest,
        passenger_count: u32,
        total_weight: Decimal,
    ) -> CoreResult<Booking> {
        let now = Utc::now();
        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let reference = (self.reference_generator)(&self.reference_prefix);
            let booking = Booking {
                id: Uuid::new_v4(),
                flight_id: req.flight_id,
                qr_code: Some(display_token(&reference)),
                booking_reference: reference,
                customer_name: req.contact.name.trim().to_string(),
                customer_email: req.contact.email.trim().to_string(),
                customer_phone: req.contact.phone.trim().to_string(),
                passenger_count,
                total_weight_kg: total_weight,
                booking_type: req.booking_type,
                payment_status: PaymentStatus::Pending,
                status: BookingStatus::Pending,
                notes: req.notes.clone(),
                created_at: now,
                updated_at: now,
            };

            match self.bookings.insert_booking(&booking).await {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::DuplicateReference(reference)) => {
                    warn!("Booking reference {} already taken (attempt {})", reference, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::InternalCommitFailure(format!(
            "could not allocate a unique booking reference after {MAX_REFERENCE_ATTEMPTS} attempts"
        )))
    }

    /// Removes a booking whose commit did not complete. Returns `false` when
    /// the booking is left behind and needs manual reconciliation.
    async fn compensate(&self, booking: &Booking) -> bool {
        match self.bookings.delete_booking(booking.id).await {
            Ok(()) => {
                info!("Rolled back booking {}", booking.booking_reference);
                true
            }
            Err(e) => {
                error!(
                    "Compensating delete failed; booking {} ({}) is orphaned: {}",
                    booking.id, booking.booking_reference, e
                );
                // Keep it off manifests at least.
                if let Err(e) = self
                    .bookings
                    .update_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Cancelled)
                    .await
                {
                    error!("Could not cancel orphaned booking {}: {}", booking.id, e);
                }
                false
            }
        }
    }

    pub async fn get_booking_by_reference(&self, reference: &str) -> CoreResult<BookingDetail> {
        let booking = self
            .bookings
            .get_booking_by_reference(reference)
            .await?
            .ok_or_else(|| CoreError::BookingNotFound(reference.to_string()))?;
        self.detail(booking).await
    }

    /// Coordinator manifest: non-cancelled bookings, oldest first.
    pub async fn list_flight_bookings(&self, flight_id: Uuid) -> CoreResult<Vec<BookingDetail>> {
        let bookings = self.bookings.list_bookings_for_flight(flight_id).await?;
        let mut details = Vec::with_capacity(bookings.len());
        for booking in bookings {
            details.push(self.detail(booking).await?);
        }
        Ok(details)
    }

    pub async fn check_in(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self
            .transition(booking_id, BookingStatus::CheckedIn, BookingStatus::can_check_in)
            .await?;
        info!("Booking {} checked in", booking.booking_reference);
        Ok(booking)
    }

    /// Cancels the booking and returns its seats and weight to the flight.
    ///
    /// The status write is a compare-and-swap, so of two racing cancels only
    /// one reaches the ledger rollback.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self
            .transition(booking_id, BookingStatus::Cancelled, BookingStatus::can_cancel)
            .await?;

        if let Err(e) = self
            .ledger
            .apply_rollback(booking.flight_id, booking.passenger_count, booking.total_weight_kg)
            .await
        {
            error!(
                "Booking {} cancelled but flight {} totals were not released: {}",
                booking.booking_reference, booking.flight_id, e
            );
            return Err(CoreError::InternalCommitFailure(format!(
                "capacity release failed for booking {}",
                booking.booking_reference
            )));
        }

        info!("Booking {} cancelled", booking.booking_reference);
        Ok(booking)
    }

    /// Bookings whose passenger rows do not match `passenger_count`.
    pub async fn find_orphaned_bookings(&self) -> CoreResult<Vec<Booking>> {
        let orphans = self.bookings.find_orphaned_bookings().await?;
        for booking in &orphans {
            warn!(
                "Booking {} expects {} passenger(s) but linked rows differ",
                booking.booking_reference, booking.passenger_count
            );
        }
        Ok(orphans)
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        to: BookingStatus,
        allowed: fn(&BookingStatus) -> bool,
    ) -> CoreResult<Booking> {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let booking = self
                .bookings
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| CoreError::BookingNotFound(booking_id.to_string()))?;

            if !allowed(&booking.status) {
                return Err(CoreError::InvalidTransition { from: booking.status, to });
            }

            if self
                .bookings
                .update_booking_status(booking_id, booking.status, to)
                .await?
            {
                return Ok(Booking { status: to, updated_at: Utc::now(), ..booking });
            }
        }

        Err(CoreError::InternalCommitFailure(format!(
            "booking {booking_id} kept changing status"
        )))
    }

    async fn detail(&self, booking: Booking) -> CoreResult<BookingDetail> {
        let flight = self.ledger.get_flight(booking.flight_id).await?;
        let route = self.flights.get_route(flight.route_id).await?.ok_or_else(|| {
            RepositoryError::NotFound(format!("route {} of flight {}", flight.route_id, flight.id))
        })?;
        let passengers = self
            .bookings
            .list_passengers(booking.id)
            .await?
            .iter()
            .map(PassengerSummary::from)
            .collect();

        Ok(BookingDetail {
            booking,
            scheduled_date: flight.scheduled_date,
            scheduled_time: flight.scheduled_time,
            route_name: route.name,
            origin: route.origin,
            destination: route.destination,
            duration_minutes: route.duration_minutes,
            base_price: route.base_price,
            passengers,
        })
    }
}
