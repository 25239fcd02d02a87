use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use aerobook_core::booking::{Booking, BookingStatus, ContactInfo, Passenger};
use aerobook_core::repository::BookingRepository;
use aerobook_core::CoreResult;

use crate::database::{db_err, parse_column, status_list};

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    reference: String,
    user_id: Option<Uuid>,
    flight_id: Uuid,
    passengers: Json<Vec<Passenger>>,
    cabin_class: String,
    total_price: Decimal,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    payment_status: String,
    payment_intent_id: Option<String>,
    status: String,
    checked_in: bool,
    checked_in_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    pub(crate) fn into_booking(self) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            flight_id: self.flight_id,
            passengers: self.passengers.0,
            cabin_class: parse_column("cabin_class", &self.cabin_class)?,
            total_price: self.total_price,
            contact_info: ContactInfo {
                email: self.contact_email,
                phone: self.contact_phone,
            },
            payment_status: parse_column("payment_status", &self.payment_status)?,
            payment_intent_id: self.payment_intent_id,
            status: parse_column("status", &self.status)?,
            checked_in: self.checked_in,
            checked_in_at: self.checked_in_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(BookingRow::into_booking).collect()
}

/// Booking half of a settlement; runs inside the payment transaction.
pub(crate) async fn settle_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    payment_intent_id: &str,
) -> CoreResult<Option<Booking>> {
    let row: Option<BookingRow> = sqlx::query_as(
        r#"
        UPDATE bookings
        SET payment_status = 'paid',
            payment_intent_id = $2,
            status = CASE WHEN status = 'booked' THEN 'confirmed' ELSE status END,
            updated_at = NOW()
        WHERE id = $1 AND payment_status = 'pending' AND status <> 'cancelled'
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(payment_intent_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;

    row.map(BookingRow::into_booking).transpose()
}

/// Booking half of a refund; runs inside the payment transaction.
pub(crate) async fn refund_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    booking_id: Uuid,
    full: bool,
) -> CoreResult<Option<Booking>> {
    let sql = if full {
        r#"
        UPDATE bookings
        SET payment_status = 'refunded', status = 'cancelled', updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#
    } else {
        r#"
        UPDATE bookings
        SET payment_status = 'partially_refunded', updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#
    };

    let row: Option<BookingRow> = sqlx::query_as(sql)
        .bind(booking_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?;

    row.map(BookingRow::into_booking).transpose()
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, reference, user_id, flight_id, passengers, cabin_class, total_price,
                                  contact_email, contact_phone, payment_status, payment_intent_id, status,
                                  checked_in, checked_in_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.reference)
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(Json(&booking.passengers))
        .bind(booking.cabin_class.as_str())
        .bind(booking.total_price)
        .bind(&booking.contact_info.email)
        .bind(&booking.contact_info.phone)
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_intent_id)
        .bind(booking.status.as_str())
        .bind(booking.checked_in)
        .bind(booking.checked_in_at)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> =
            sqlx::query_as("SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        into_bookings(rows)
    }

    async fn list_active_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT * FROM bookings WHERE flight_id = $1 AND status <> 'cancelled' ORDER BY created_at",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        into_bookings(rows)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            UPDATE bookings
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status_list(from))
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn mark_checked_in(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            UPDATE bookings
            SET status = 'checked_in', checked_in = TRUE, checked_in_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'confirmed' AND checked_in = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(BookingRow::into_booking).transpose()
    }
}
