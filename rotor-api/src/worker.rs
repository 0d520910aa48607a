use std::time::Duration;

use rotor_core::booking::BookingService;
use rotor_core::holds::HoldManager;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Periodically deletes expired holds and reports bookings left inconsistent
/// by a failed compensation. Reads never depend on this having run.
pub async fn start_hold_sweeper(holds: HoldManager, bookings: BookingService, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Hold sweeper started, running every {:?}", every);

    loop {
        ticker.tick().await;
        run_once(&holds, &bookings).await;
    }
}

pub async fn run_once(holds: &HoldManager, bookings: &BookingService) {
    if let Err(e) = holds.sweep_expired().await {
        error!("Hold sweep failed: {}", e);
    }

    match bookings.find_orphaned_bookings().await {
        Ok(orphans) if !orphans.is_empty() => {
            error!("{} booking(s) need manual reconciliation", orphans.len());
        }
        Ok(_) => {}
        Err(e) => error!("Orphaned booking scan failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rotor_core::holds::HoldPolicy;
    use rotor_core::memory::{sample_flight, InMemoryStore};
    use rotor_core::models::FlightHold;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_run_once_removes_expired_holds() {
        let store = Arc::new(InMemoryStore::new());
        let flight = sample_flight(4, Decimal::from(400));
        store.add_flight(flight.clone()).await;

        let now = Utc::now();
        store
            .insert_hold(FlightHold {
                id: Uuid::new_v4(),
                flight_id: flight.id,
                session_id: "stale".to_string(),
                passenger_count: 2,
                expires_at: now - ChronoDuration::seconds(5),
                created_at: now - ChronoDuration::minutes(16),
            })
            .await;

        let holds = HoldManager::new(store.clone(), store.clone(), HoldPolicy::default());
        let bookings = BookingService::new(store.clone(), store.clone(), holds.clone(), "HT");

        run_once(&holds, &bookings).await;
        assert!(store.all_holds().await.is_empty());
    }
}
