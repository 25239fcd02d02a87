//! Single-process store used when no database is configured, and by tests.
//! One async mutex guards every table, so each trait call is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use aerobook_core::booking::{Booking, BookingPaymentStatus, BookingStatus};
use aerobook_core::flight::{Flight, FlightUpdate};
use aerobook_core::notification::{Channel, Notification, NotificationType};
use aerobook_core::payment::{GatewayPayload, Payment, PaymentStatus, RefundRecord};
use aerobook_core::repository::{
    BookingRepository, FlightRepository, NotificationRepository, PaymentLedger, Settlement,
    UserRepository,
};
use aerobook_core::user::User;
use aerobook_core::{CoreError, CoreResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    flights: HashMap<Uuid, Flight>,
    bookings: HashMap<Uuid, Booking>,
    payments: Vec<Payment>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.tables.lock().await.users.insert(user.id, user);
    }

    pub async fn add_flight(&self, flight: Flight) {
        self.tables.lock().await.flights.insert(flight.id, flight);
    }
}

fn newest_first<T, F>(mut items: Vec<T>, created: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created(item)));
    items
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        Ok(self.tables.lock().await.flights.get(&id).cloned())
    }

    async fn find_by_number(&self, flight_number: &str) -> CoreResult<Option<Flight>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .flights
            .values()
            .find(|f| f.flight_number == flight_number)
            .cloned())
    }

    async fn create_flight(&self, flight: &Flight) -> CoreResult<Flight> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .flights
            .values()
            .find(|f| f.flight_number == flight.flight_number)
        {
            return Ok(existing.clone());
        }
        tables.flights.insert(flight.id, flight.clone());
        Ok(flight.clone())
    }

    async fn apply_update(&self, update: &FlightUpdate) -> CoreResult<Option<Flight>> {
        let mut tables = self.tables.lock().await;
        let Some(flight) = tables
            .flights
            .values_mut()
            .find(|f| f.flight_number == update.flight_number)
        else {
            return Ok(None);
        };

        if let Some(status) = &update.status {
            flight.status = status.clone();
        }
        if let Some(departure) = update.estimated_departure {
            flight.departure_date = departure;
        }
        if let Some(arrival) = update.estimated_arrival {
            flight.arrival_date = Some(arrival);
        }
        Ok(Some(flight.clone()))
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.bookings.values().any(|b| b.reference == booking.reference) {
            return Err(CoreError::Conflict(format!(
                "Booking reference {} already exists",
                booking.reference
            )));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(newest_first(bookings, |b| b.created_at))
    }

    async fn list_active_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.flight_id == flight_id && b.status != BookingStatus::Cancelled)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> CoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&id) {
            Some(booking) if from.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_checked_in(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&id) {
            Some(booking) if booking.status == BookingStatus::Confirmed && !booking.checked_in => {
                booking.status = BookingStatus::CheckedIn;
                booking.checked_in = true;
                booking.checked_in_at = Some(at);
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl PaymentLedger for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables
            .payments
            .iter()
            .any(|p| p.payment_intent_id == payment.payment_intent_id)
        {
            return Err(CoreError::Conflict(format!(
                "Payment intent {} already recorded",
                payment.payment_intent_id
            )));
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn find_by_intent(&self, intent_id: &str) -> CoreResult<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.payment_intent_id == intent_id)
            .cloned())
    }

    async fn latest_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.history_for_booking(booking_id).await?.into_iter().next())
    }

    async fn history_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let tables = self.tables.lock().await;
        // Reversed first so later inserts win ties on created_at.
        let payments: Vec<Payment> = tables
            .payments
            .iter()
            .rev()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        Ok(newest_first(payments, |p| p.created_at))
    }

    async fn settle_success(
        &self,
        intent_id: &str,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Settlement> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        let Some(payment) = tables
            .payments
            .iter_mut()
            .find(|p| p.payment_intent_id == intent_id)
        else {
            return Ok(Settlement::NotFound);
        };

        if !PaymentStatus::UNSETTLED.contains(&payment.status) {
            return Ok(Settlement::AlreadySettled(payment.clone()));
        }

        let now = Utc::now();
        payment.status = PaymentStatus::Succeeded;
        if let Some(raw) = payload {
            payment.raw = raw;
        }
        payment.updated_at = now;
        let payment = payment.clone();

        let booking = match tables.bookings.get_mut(&payment.booking_id) {
            Some(booking)
                if booking.payment_status == BookingPaymentStatus::Pending
                    && booking.status != BookingStatus::Cancelled =>
            {
                booking.settle(intent_id, now);
                Some(booking.clone())
            }
            _ => None,
        };

        Ok(Settlement::Applied { payment, booking })
    }

    async fn mark_status(
        &self,
        intent_id: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Option<Payment>> {
        let mut tables = self.tables.lock().await;
        match tables
            .payments
            .iter_mut()
            .find(|p| p.payment_intent_id == intent_id)
        {
            Some(payment) if from.contains(&payment.status) => {
                payment.status = to;
                if let Some(raw) = payload {
                    payment.raw = raw;
                }
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn claim_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        amount: Decimal,
    ) -> CoreResult<Option<Payment>> {
        let mut tables = self.tables.lock().await;
        match tables.payments.iter_mut().find(|p| p.id == payment_id) {
            Some(payment)
                if payment.status == expected_status
                    && payment.refunded_so_far() == expected_refunded
                    && payment.refund_pending.is_none() =>
            {
                payment.refund_pending = Some(amount);
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_refund(&self, payment_id: Uuid) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(payment) = tables.payments.iter_mut().find(|p| p.id == payment_id) {
            payment.refund_pending = None;
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        refund: &RefundRecord,
    ) -> CoreResult<Option<(Payment, Option<Booking>)>> {
        let mut guard = self.tables.lock().await;
        let tables = &mut *guard;
        let Some(payment) = tables.payments.iter_mut().find(|p| p.id == payment_id) else {
            return Ok(None);
        };
        if payment.status != expected_status || payment.refunded_so_far() != expected_refunded {
            return Ok(None);
        }

        payment.apply_refund(refund);
        let payment = payment.clone();

        let booking = tables.bookings.get_mut(&payment.booking_id).map(|booking| {
            booking.apply_refund(refund.full, refund.refunded_at);
            booking.clone()
        });

        Ok(Some((payment, booking)))
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> CoreResult<()> {
        self.tables
            .lock()
            .await
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn update_delivery(&self, id: Uuid, sent: bool, error: Option<String>) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("Notification {}", id)))?;
        notification.sent = sent;
        notification.error = error;
        notification.updated_at = Utc::now();
        Ok(())
    }

    async fn list_notifications_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        let items: Vec<Notification> = tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == Some(user_id))
            .cloned()
            .collect();
        Ok(newest_first(items, |n| n.created_at))
    }

    async fn list_notifications_for_booking(
        &self,
        booking_id: Uuid,
    ) -> CoreResult<Vec<Notification>> {
        let tables = self.tables.lock().await;
        let items: Vec<Notification> = tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.booking_id == Some(booking_id))
            .cloned()
            .collect();
        Ok(newest_first(items, |n| n.created_at))
    }

    async fn has_sent(
        &self,
        booking_id: Uuid,
        kind: NotificationType,
        channel: Channel,
    ) -> CoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.iter().any(|n| {
            n.booking_id == Some(booking_id) && n.kind == kind && n.channel == channel && n.sent
        }))
    }
}
