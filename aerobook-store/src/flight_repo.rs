use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use aerobook_core::flight::{Flight, FlightUpdate};
use aerobook_core::repository::{FlightRepository, UserRepository};
use aerobook_core::user::User;
use aerobook_core::CoreResult;

use crate::database::{db_err, parse_column};

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    airline: String,
    flight_number: String,
    origin: String,
    destination: String,
    departure_date: DateTime<Utc>,
    arrival_date: Option<DateTime<Utc>>,
    duration_minutes: Option<i32>,
    price: Decimal,
    seats_available: i32,
    cabin_class: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl FlightRow {
    fn into_flight(self) -> CoreResult<Flight> {
        Ok(Flight {
            id: self.id,
            airline: self.airline,
            flight_number: self.flight_number,
            origin: self.origin,
            destination: self.destination,
            departure_date: self.departure_date,
            arrival_date: self.arrival_date,
            duration_minutes: self.duration_minutes,
            price: self.price,
            seats_available: self.seats_available,
            cabin_class: parse_column("cabin_class", &self.cabin_class)?,
            status: self.status,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as("SELECT * FROM flights WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(FlightRow::into_flight).transpose()
    }

    async fn find_by_number(&self, flight_number: &str) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as("SELECT * FROM flights WHERE flight_number = $1")
            .bind(flight_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(FlightRow::into_flight).transpose()
    }

    async fn create_flight(&self, flight: &Flight) -> CoreResult<Flight> {
        let inserted: Option<FlightRow> = sqlx::query_as(
            r#"
            INSERT INTO flights (id, airline, flight_number, origin, destination, departure_date, arrival_date,
                                 duration_minutes, price, seats_available, cabin_class, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (flight_number) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(flight.id)
        .bind(&flight.airline)
        .bind(&flight.flight_number)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(flight.departure_date)
        .bind(flight.arrival_date)
        .bind(flight.duration_minutes)
        .bind(flight.price)
        .bind(flight.seats_available)
        .bind(flight.cabin_class.as_str())
        .bind(&flight.status)
        .bind(flight.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match inserted {
            Some(row) => {
                info!("Created walk-up flight {}", flight.flight_number);
                row.into_flight()
            }
            None => self
                .find_by_number(&flight.flight_number)
                .await?
                .ok_or_else(|| {
                    aerobook_core::CoreError::StorageError(format!(
                        "Flight {} vanished after insert conflict",
                        flight.flight_number
                    ))
                }),
        }
    }

    async fn apply_update(&self, update: &FlightUpdate) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            r#"
            UPDATE flights
            SET status = COALESCE($2, status),
                departure_date = COALESCE($3, departure_date),
                arrival_date = COALESCE($4, arrival_date)
            WHERE flight_number = $1
            RETURNING *
            "#,
        )
        .bind(&update.flight_number)
        .bind(&update.status)
        .bind(update.estimated_departure)
        .bind(update.estimated_arrival)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(FlightRow::into_flight).transpose()
    }
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, email, phone FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(|r| User {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
        }))
    }
}
