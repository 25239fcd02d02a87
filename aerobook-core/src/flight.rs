use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::CabinClass;
use crate::{CoreError, CoreResult};

pub const DEFAULT_FLIGHT_STATUS: &str = "scheduled";
pub const DEFAULT_SEATS: i32 = 180;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: Uuid,
    pub airline: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: DateTime<Utc>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub price: Decimal,
    pub seats_available: i32,
    pub cabin_class: CabinClass,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Flight fields a walk-up checkout may carry instead of a booking id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDetails {
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<DateTime<Utc>>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub price: Option<Decimal>,
}

impl FlightDetails {
    pub fn is_present(&self) -> bool {
        self.flight_number
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false)
    }
}

fn required<T>(value: Option<T>, field: &str) -> CoreResult<T> {
    value.ok_or_else(|| CoreError::ValidationError(format!("{} is required", field)))
}

fn required_text(value: Option<String>, field: &str) -> CoreResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CoreError::ValidationError(format!("{} is required", field))),
    }
}

impl Flight {
    pub fn from_details(details: FlightDetails, cabin_class: CabinClass) -> CoreResult<Self> {
        let flight_number = required_text(details.flight_number, "flightNumber")?;
        let origin = required_text(details.origin, "origin")?;
        let destination = required_text(details.destination, "destination")?;
        let departure_date = required(details.departure_date, "departureDate")?;
        let price = required(details.price, "price")?;
        if price < Decimal::ZERO {
            return Err(CoreError::ValidationError(format!(
                "price must not be negative, got {}",
                price
            )));
        }

        let duration_minutes = details.duration_minutes.or_else(|| {
            details
                .arrival_date
                .map(|arrival| (arrival - departure_date).num_minutes() as i32)
        });

        Ok(Self {
            id: Uuid::new_v4(),
            airline: details.airline.unwrap_or_else(|| "Unknown".to_string()),
            flight_number,
            origin,
            destination,
            departure_date,
            arrival_date: details.arrival_date,
            duration_minutes,
            price,
            seats_available: DEFAULT_SEATS,
            cabin_class,
            status: DEFAULT_FLIGHT_STATUS.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Trusted status push from an airline system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightUpdate {
    pub flight_number: String,
    /// Absent keeps the current status.
    pub status: Option<String>,
    pub estimated_departure: Option<DateTime<Utc>>,
    pub estimated_arrival: Option<DateTime<Utc>>,
}
