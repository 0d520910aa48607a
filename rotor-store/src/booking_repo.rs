use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use rotor_core::models::{Booking, BookingStatus, Passenger, PassengerInput};
use rotor_core::repository::{BookingRepository, RepositoryError, RepositoryResult};

use crate::backend_error;

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    flight_id: Uuid,
    booking_reference: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    passenger_count: i32,
    total_weight_kg: Decimal,
    booking_type: String,
    payment_status: String,
    status: String,
    qr_code: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    booking_id: Uuid,
    name: String,
    weight_kg: Decimal,
    seat_number: Option<i32>,
    created_at: DateTime<Utc>,
}

fn corrupt(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            flight_id: row.flight_id,
            booking_reference: row.booking_reference,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            passenger_count: u32::try_from(row.passenger_count).map_err(corrupt)?,
            total_weight_kg: row.total_weight_kg,
            booking_type: row.booking_type.parse().map_err(corrupt)?,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            qr_code: row.qr_code,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: row.id,
            booking_id: row.booking_id,
            name: row.name,
            weight_kg: row.weight_kg,
            seat_number: row.seat_number,
            created_at: row.created_at,
        }
    }
}

const BOOKING_COLUMNS: &str = "b.id, b.flight_id, b.booking_reference, b.customer_name, \
     b.customer_email, b.customer_phone, b.passenger_count, b.total_weight_kg, b.booking_type, \
     b.payment_status, b.status, b.qr_code, b.notes, b.created_at, b.updated_at";

fn to_bookings(rows: Vec<BookingRow>) -> RepositoryResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let passenger_count = i32::try_from(booking.passenger_count).map_err(corrupt)?;

        // Plain INSERT: a reference collision must fail, never overwrite.
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (id, flight_id, booking_reference, customer_name, customer_email,
                customer_phone, passenger_count, total_weight_kg, booking_type, payment_status,
                status, qr_code, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(booking.id)
        .bind(booking.flight_id)
        .bind(&booking.booking_reference)
        .bind(&booking.customer_name)
        .bind(&booking.customer_email)
        .bind(&booking.customer_phone)
        .bind(passenger_count)
        .bind(booking.total_weight_kg)
        .bind(booking.booking_type.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.status.as_str())
        .bind(&booking.qr_code)
        .bind(&booking.notes)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(booking.clone()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(RepositoryError::DuplicateReference(booking.booking_reference.clone()))
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn insert_passengers(
        &self,
        booking_id: Uuid,
        passengers: &[PassengerInput],
    ) -> RepositoryResult<Vec<Passenger>> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;
        let mut stored = Vec::with_capacity(passengers.len());

        for passenger in passengers {
            let row: PassengerRow = sqlx::query_as(
                r#"
                INSERT INTO passengers (id, booking_id, name, weight_kg)
                VALUES ($1, $2, $3, $4)
                RETURNING id, booking_id, name, weight_kg, seat_number, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(booking_id)
            .bind(passenger.name.trim())
            .bind(passenger.weight_kg)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend_error)?;

            stored.push(Passenger::from(row));
        }

        tx.commit().await.map_err(backend_error)?;
        Ok(stored)
    }

    async fn delete_booking(&self, id: Uuid) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.booking_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_flight(&self, flight_id: Uuid) -> RepositoryResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings b
            WHERE b.flight_id = $1 AND b.status <> 'cancelled'
            ORDER BY b.created_at ASC
            "#
        ))
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        to_bookings(rows)
    }

    async fn list_passengers(&self, booking_id: Uuid) -> RepositoryResult<Vec<Passenger>> {
        let rows: Vec<PassengerRow> = sqlx::query_as(
            r#"
            SELECT id, booking_id, name, weight_kg, seat_number, created_at
            FROM passengers WHERE booking_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(rows.into_iter().map(Passenger::from).collect())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        new: BookingStatus,
    ) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(new.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;

        if exists {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound(format!("booking {id}")))
        }
    }

    async fn find_orphaned_bookings(&self) -> RepositoryResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {BOOKING_COLUMNS} FROM bookings b
            LEFT JOIN passengers p ON p.booking_id = b.id
            GROUP BY b.id
            HAVING COUNT(p.id) <> b.passenger_count
            ORDER BY b.created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        to_bookings(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_core::models::{BookingType, PaymentStatus};

    fn row() -> BookingRow {
        let now = Utc::now();
        BookingRow {
            id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            booking_reference: "HT-7KQ2M9XD".to_string(),
            customer_name: "Mele".to_string(),
            customer_email: "mele@example.com".to_string(),
            customer_phone: "808-555-0100".to_string(),
            passenger_count: 2,
            total_weight_kg: Decimal::new(1455, 1),
            booking_type: "walkin".to_string(),
            payment_status: "pending".to_string(),
            status: "checked_in".to_string(),
            qr_code: Some("QR-HT-7KQ2M9XD".to_string()),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_parses_text_columns() {
        let booking = Booking::try_from(row()).unwrap();
        assert_eq!(booking.booking_type, BookingType::WalkIn);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.status, BookingStatus::CheckedIn);
        assert_eq!(booking.passenger_count, 2);
    }

    #[test]
    fn test_unknown_channel_is_rejected() {
        let mut bad = row();
        bad.booking_type = "kiosk".to_string();
        assert!(matches!(Booking::try_from(bad), Err(RepositoryError::Backend(_))));
    }
}
