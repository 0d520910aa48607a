use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use rotor_core::models::{CapacityTotals, Flight, FlightStatus, Route};
use rotor_core::repository::{FlightRepository, RepositoryError, RepositoryResult};

use crate::backend_error;

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FlightRow {
    id: Uuid,
    route_id: Uuid,
    scheduled_date: NaiveDate,
    scheduled_time: NaiveTime,
    max_passengers: i32,
    max_weight_kg: Decimal,
    current_passengers: i32,
    current_weight_kg: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    origin: String,
    destination: String,
    duration_minutes: i32,
    base_price: Decimal,
}

#[derive(sqlx::FromRow)]
struct OpenFlightRow {
    #[sqlx(flatten)]
    flight: FlightRow,
    route_name: String,
    origin: String,
    destination: String,
    duration_minutes: i32,
    base_price: Decimal,
}

fn non_negative(column: &str, value: i32) -> RepositoryResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Backend(format!("negative {column} in flights row: {value}")))
}

fn to_db_int(value: u32) -> RepositoryResult<i32> {
    i32::try_from(value).map_err(|_| RepositoryError::Backend(format!("{value} exceeds INTEGER")))
}

impl TryFrom<FlightRow> for Flight {
    type Error = RepositoryError;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        Ok(Flight {
            id: row.id,
            route_id: row.route_id,
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            max_passengers: non_negative("max_passengers", row.max_passengers)?,
            max_weight_kg: row.max_weight_kg,
            current_passengers: non_negative("current_passengers", row.current_passengers)?,
            current_weight_kg: row.current_weight_kg,
            status: row
                .status
                .parse::<FlightStatus>()
                .map_err(|e| RepositoryError::Backend(e.to_string()))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            name: row.name,
            origin: row.origin,
            destination: row.destination,
            duration_minutes: row.duration_minutes,
            base_price: row.base_price,
        }
    }
}

const FLIGHT_COLUMNS: &str = "f.id, f.route_id, f.scheduled_date, f.scheduled_time, \
     f.max_passengers, f.max_weight_kg, f.current_passengers, f.current_weight_kg, \
     f.status, f.created_at, f.updated_at";

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn get_flight(&self, id: Uuid) -> RepositoryResult<Option<Flight>> {
        let row: Option<FlightRow> =
            sqlx::query_as(&format!("SELECT {FLIGHT_COLUMNS} FROM flights f WHERE f.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_error)?;

        row.map(Flight::try_from).transpose()
    }

    async fn list_open_flights(&self, limit: u32) -> RepositoryResult<Vec<(Flight, Route)>> {
        let rows: Vec<OpenFlightRow> = sqlx::query_as(&format!(
            r#"
            SELECT {FLIGHT_COLUMNS},
                r.name AS route_name, r.origin, r.destination, r.duration_minutes, r.base_price
            FROM flights f
            JOIN routes r ON r.id = f.route_id
            WHERE f.status IN ('scheduled', 'confirmed')
                AND f.scheduled_date >= CURRENT_DATE
            ORDER BY f.scheduled_date ASC, f.scheduled_time ASC
            LIMIT $1
            "#
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        rows.into_iter()
            .map(|row| {
                let route = Route {
                    id: row.flight.route_id,
                    name: row.route_name,
                    origin: row.origin,
                    destination: row.destination,
                    duration_minutes: row.duration_minutes,
                    base_price: row.base_price,
                };
                Ok((Flight::try_from(row.flight)?, route))
            })
            .collect()
    }

    async fn get_route(&self, id: Uuid) -> RepositoryResult<Option<Route>> {
        let row: Option<RouteRow> = sqlx::query_as(
            "SELECT id, name, origin, destination, duration_minutes, base_price FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(row.map(Route::from))
    }

    async fn conditional_update_flight_totals(
        &self,
        id: Uuid,
        expected: CapacityTotals,
        new: CapacityTotals,
    ) -> RepositoryResult<bool> {
        // The WHERE clause is the compare-and-swap; the max guards and the
        // table CHECK constraints are a second line against overshoot.
        let result = sqlx::query(
            r#"
            UPDATE flights
            SET current_passengers = $4, current_weight_kg = $5, updated_at = NOW()
            WHERE id = $1
                AND current_passengers = $2
                AND current_weight_kg = $3
                AND $4 <= max_passengers
                AND $5 <= max_weight_kg
            "#,
        )
        .bind(id)
        .bind(to_db_int(expected.passengers)?)
        .bind(expected.weight_kg)
        .bind(to_db_int(new.passengers)?)
        .bind(new.weight_kg)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, current: i32) -> FlightRow {
        let now = Utc::now();
        FlightRow {
            id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
            max_passengers: 6,
            max_weight_kg: Decimal::new(55000, 2),
            current_passengers: current,
            current_weight_kg: Decimal::new(16050, 2),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_converts_to_flight() {
        let flight = Flight::try_from(row("confirmed", 2)).unwrap();
        assert_eq!(flight.status, FlightStatus::Confirmed);
        assert_eq!(flight.current_passengers, 2);
        assert_eq!(flight.remaining_seats(), 4);
        assert_eq!(flight.remaining_weight_kg(), Decimal::new(38950, 2));
    }

    #[test]
    fn test_corrupt_rows_are_backend_errors() {
        assert!(matches!(
            Flight::try_from(row("boarding", 0)),
            Err(RepositoryError::Backend(_))
        ));
        assert!(matches!(
            Flight::try_from(row("scheduled", -1)),
            Err(RepositoryError::Backend(_))
        ));
    }
}
