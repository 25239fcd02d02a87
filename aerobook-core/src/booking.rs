use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flight::Flight;
use crate::user::User;
use crate::{CoreError, CoreResult};

pub const REFERENCE_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    #[default]
    Economy,
    Business,
    First,
}

crate::string_enum!(CabinClass, "cabin class", {
    Economy => "economy",
    Business => "business",
    First => "first",
});

impl CabinClass {
    pub fn multiplier(&self) -> Decimal {
        match self {
            CabinClass::Economy => Decimal::ONE,
            CabinClass::Business => Decimal::new(15, 1),
            CabinClass::First => Decimal::TWO,
        }
    }
}

/// Lifecycle of the reservation itself, independent of the money.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Confirmed,
    Cancelled,
    CheckedIn,
}

crate::string_enum!(BookingStatus, "booking status", {
    Booked => "booked",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    CheckedIn => "checked_in",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    Paid,
    Refunded,
    PartiallyRefunded,
}

crate::string_enum!(BookingPaymentStatus, "booking payment status", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.phone.is_none()
    }

    /// Missing fields are taken from the owner's profile.
    pub fn filled_from(self, profile: Option<&User>) -> Self {
        match profile {
            Some(user) => ContactInfo {
                email: self.email.or_else(|| Some(user.email.clone())),
                phone: self.phone.or_else(|| user.phone.clone()),
            },
            None => self,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    pub user_id: Option<Uuid>,
    pub flight_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub cabin_class: CabinClass,
    pub total_price: Decimal,
    pub contact_info: ContactInfo,
    pub payment_status: BookingPaymentStatus,
    pub payment_intent_id: Option<String>,
    pub status: BookingStatus,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a caller supplies to reserve seats; price and identity are derived.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Option<Uuid>,
    pub passengers: Vec<Passenger>,
    pub cabin_class: CabinClass,
    pub contact_info: ContactInfo,
}

impl Booking {
    pub fn new(flight: &Flight, request: NewBooking, owner: Option<&User>) -> CoreResult<Self> {
        if request.passengers.is_empty() {
            return Err(CoreError::ValidationError(
                "At least one passenger is required".to_string(),
            ));
        }
        if let Some(p) = request.passengers.iter().find(|p| p.first_name.trim().is_empty()) {
            return Err(CoreError::ValidationError(format!(
                "Passenger first name is required (last name: '{}')",
                p.last_name
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            user_id: request.user_id,
            flight_id: flight.id,
            total_price: total_price(flight.price, request.passengers.len(), request.cabin_class),
            passengers: request.passengers,
            cabin_class: request.cabin_class,
            contact_info: request.contact_info.filled_from(owner),
            payment_status: BookingPaymentStatus::Pending,
            payment_intent_id: None,
            status: BookingStatus::Booked,
            checked_in: false,
            checked_in_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn ensure_cancellable(&self) -> CoreResult<()> {
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(format!(
                "Booking {} is already cancelled",
                self.reference
            )));
        }
        Ok(())
    }

    pub fn ensure_check_in_allowed(&self) -> CoreResult<()> {
        if self.checked_in || self.status == BookingStatus::CheckedIn {
            return Err(CoreError::Conflict(format!(
                "Booking {} is already checked in",
                self.reference
            )));
        }
        if self.status != BookingStatus::Confirmed {
            return Err(CoreError::Conflict(format!(
                "Booking {} must be confirmed before check-in (current status: {})",
                self.reference, self.status
            )));
        }
        Ok(())
    }

    /// Records a settled payment; a `booked` reservation becomes `confirmed`.
    pub fn settle(&mut self, payment_intent_id: &str, at: DateTime<Utc>) {
        self.payment_status = BookingPaymentStatus::Paid;
        self.payment_intent_id = Some(payment_intent_id.to_string());
        if self.status == BookingStatus::Booked {
            self.status = BookingStatus::Confirmed;
        }
        self.updated_at = at;
    }

    /// Full refunds cancel the booking; partial ones leave its status alone.
    pub fn apply_refund(&mut self, full: bool, at: DateTime<Utc>) {
        if full {
            self.payment_status = BookingPaymentStatus::Refunded;
            self.status = BookingStatus::Cancelled;
        } else {
            self.payment_status = BookingPaymentStatus::PartiallyRefunded;
        }
        self.updated_at = at;
    }

    /// A new payment attempt only makes sense for a live, unpaid booking.
    pub fn ensure_payable(&self) -> CoreResult<()> {
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(format!(
                "Booking {} is cancelled",
                self.reference
            )));
        }
        if self.payment_status != BookingPaymentStatus::Pending {
            return Err(CoreError::Conflict(format!(
                "Booking {} is already {}",
                self.reference, self.payment_status
            )));
        }
        Ok(())
    }
}

pub fn total_price(flight_price: Decimal, passenger_count: usize, cabin: CabinClass) -> Decimal {
    flight_price * Decimal::from(passenger_count as u64) * cabin.multiplier()
}

pub fn generate_reference() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERENCE_LENGTH)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}
