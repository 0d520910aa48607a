use std::sync::Arc;

use rotor_core::booking::BookingService;
use rotor_core::holds::HoldManager;
use rotor_core::repository::{BookingRepository, FlightRepository, HoldRepository};
use rotor_store::app_config::{BusinessRules, RateLimitConfig};
use rotor_store::RedisClient;

#[derive(Clone)]
pub struct AppState {
    pub holds: HoldManager,
    pub bookings: BookingService,
    /// Rate limiting is skipped when Redis is not configured.
    pub redis: Option<Arc<RedisClient>>,
    pub business_rules: BusinessRules,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(
        flights: Arc<dyn FlightRepository>,
        holds: Arc<dyn HoldRepository>,
        bookings: Arc<dyn BookingRepository>,
        business_rules: BusinessRules,
    ) -> Self {
        let hold_manager = HoldManager::new(flights.clone(), holds, business_rules.hold_policy());
        let booking_service = BookingService::new(
            flights,
            bookings,
            hold_manager.clone(),
            business_rules.booking_reference_prefix.clone(),
        );

        Self {
            holds: hold_manager,
            bookings: booking_service,
            redis: None,
            business_rules,
            rate_limit: RateLimitConfig::default(),
        }
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, rate_limit: RateLimitConfig) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }
}
