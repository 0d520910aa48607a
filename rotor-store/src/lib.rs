pub mod app_config;
pub mod database;
pub mod redis_repo;
pub mod flight_repo;
pub mod hold_repo;
pub mod booking_repo;

pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use flight_repo::PostgresFlightRepository;
pub use hold_repo::PostgresHoldRepository;
pub use booking_repo::PostgresBookingRepository;

use rotor_core::repository::RepositoryError;

/// Maps a driver error onto the repository error the core understands.
pub(crate) fn backend_error(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}
