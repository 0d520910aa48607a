use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use rotor_core::models::FlightHold;
use rotor_core::repository::{HoldRepository, HoldWrite, RepositoryError, RepositoryResult};

use crate::backend_error;

pub struct PostgresHoldRepository {
    pool: PgPool,
}

impl PostgresHoldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    flight_id: Uuid,
    session_id: String,
    passenger_count: i32,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for FlightHold {
    type Error = RepositoryError;

    fn try_from(row: HoldRow) -> Result<Self, Self::Error> {
        Ok(FlightHold {
            id: row.id,
            flight_id: row.flight_id,
            session_id: row.session_id,
            passenger_count: u32::try_from(row.passenger_count).map_err(|_| {
                RepositoryError::Backend(format!("hold {} has negative passenger_count", row.id))
            })?,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl HoldRepository for PostgresHoldRepository {
    async fn read_active_holds(
        &self,
        flight_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<FlightHold>> {
        let rows: Vec<HoldRow> = sqlx::query_as(
            r#"
            SELECT id, flight_id, session_id, passenger_count, expires_at, created_at
            FROM flight_holds
            WHERE flight_id = $1 AND expires_at > $2
            "#,
        )
        .bind(flight_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.into_iter().map(FlightHold::try_from).collect()
    }

    async fn place_hold(&self, hold: &FlightHold) -> RepositoryResult<HoldWrite> {
        let passenger_count = i32::try_from(hold.passenger_count)
            .map_err(|_| RepositoryError::Backend("passenger_count exceeds INTEGER".to_string()))?;

        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        // Row lock on the flight serializes hold placement per flight.
        let capacity: Option<(i32, i32)> = sqlx::query_as(
            "SELECT max_passengers, current_passengers FROM flights WHERE id = $1 FOR UPDATE",
        )
        .bind(hold.flight_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend_error)?;
        let Some((max_passengers, current_passengers)) = capacity else {
            return Err(RepositoryError::NotFound(format!("flight {}", hold.flight_id)));
        };

        let held: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(passenger_count), 0)::BIGINT
            FROM flight_holds
            WHERE flight_id = $1 AND session_id <> $2 AND expires_at > $3
            "#,
        )
        .bind(hold.flight_id)
        .bind(&hold.session_id)
        .bind(hold.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend_error)?;

        let remaining = i64::from(max_passengers.saturating_sub(current_passengers).max(0));
        let available = u32::try_from(remaining.saturating_sub(held).max(0)).unwrap_or(0);
        if hold.passenger_count > available {
            tx.rollback().await.map_err(backend_error)?;
            return Ok(HoldWrite::Insufficient { available });
        }

        // Replaces any hold for the same (flight, session) in the same statement.
        let row: HoldRow = sqlx::query_as(
            r#"
            INSERT INTO flight_holds (id, flight_id, session_id, passenger_count, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (flight_id, session_id) DO UPDATE
            SET id = EXCLUDED.id,
                passenger_count = EXCLUDED.passenger_count,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            RETURNING id, flight_id, session_id, passenger_count, expires_at, created_at
            "#,
        )
        .bind(hold.id)
        .bind(hold.flight_id)
        .bind(&hold.session_id)
        .bind(passenger_count)
        .bind(hold.expires_at)
        .bind(hold.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend_error)?;

        tx.commit().await.map_err(backend_error)?;
        Ok(HoldWrite::Placed(FlightHold::try_from(row)?))
    }

    async fn delete_hold(
        &self,
        session_id: &str,
        flight_id: Option<Uuid>,
    ) -> RepositoryResult<u64> {
        let result = sqlx::query(
            "DELETE FROM flight_holds WHERE session_id = $1 AND ($2::uuid IS NULL OR flight_id = $2)",
        )
        .bind(session_id)
        .bind(flight_id)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_holds(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = sqlx::query("DELETE FROM flight_holds WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;

        if result.rows_affected() > 0 {
            info!("Deleted {} expired flight hold(s)", result.rows_affected());
        }
        Ok(result.rows_affected())
    }
}
