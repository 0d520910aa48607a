use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rotor_api::{app, worker, AppState};
use rotor_store::app_config::Config;
use rotor_store::{
    DbClient, PostgresBookingRepository, PostgresFlightRepository, PostgresHoldRepository,
    RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rotor_api=debug,rotor_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Rotor API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let business_rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await
        .context("Failed to load business rules")?;

    let mut state = AppState::new(
        Arc::new(PostgresFlightRepository::new(db.pool.clone())),
        Arc::new(PostgresHoldRepository::new(db.pool.clone())),
        Arc::new(PostgresBookingRepository::new(db.pool.clone())),
        business_rules.clone(),
    );

    // Redis only backs rate limiting; without it the API runs unthrottled.
    match &config.redis {
        Some(redis) => {
            let client = RedisClient::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?;
            state = state.with_rate_limit(Arc::new(client), config.rate_limit.clone());
        }
        None => tracing::warn!("No [redis] section configured, rate limiting disabled"),
    }

    tokio::spawn(worker::start_hold_sweeper(
        state.holds.clone(),
        state.bookings.clone(),
        Duration::from_secs(business_rules.hold_sweep_interval_seconds.max(1)),
    ));

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
