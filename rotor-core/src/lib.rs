pub mod models;
pub mod repository;
pub mod availability;
pub mod validation;
pub mod ledger;
pub mod holds;
pub mod booking;
pub mod memory;

use uuid::Uuid;

use crate::models::{BookingStatus, FlightStatus};
use crate::repository::RepositoryError;
use crate::validation::CapacityShortfall;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Flight not found: {0}")]
    FlightNotFound(Uuid),
    #[error("Booking not found: {0}")]
    BookingNotFound(String),
    #[error("Flight {flight_id} is {status} and not open for booking")]
    FlightNotOpen { flight_id: Uuid, status: FlightStatus },
    #[error("Not enough seats available: requested {requested}, available {available}")]
    InsufficientCapacity { requested: u32, available: u32 },
    #[error("Flight capacity exceeded: {0}")]
    CapacityExceeded(CapacityShortfall),
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("Booking commit failed: {0}")]
    InternalCommitFailure(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type CoreResult<T> = Result<T, CoreError>;
