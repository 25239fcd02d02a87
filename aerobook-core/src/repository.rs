use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::flight::{Flight, FlightUpdate};
use crate::notification::{Channel, Notification, NotificationType};
use crate::payment::{GatewayPayload, Payment, PaymentStatus, RefundRecord};
use crate::user::User;
use crate::CoreResult;

#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>>;

    async fn find_by_number(&self, flight_number: &str) -> CoreResult<Option<Flight>>;

    /// Inserts the flight, or returns the stored one when the number is taken.
    async fn create_flight(&self, flight: &Flight) -> CoreResult<Flight>;

    async fn apply_update(&self, update: &FlightUpdate) -> CoreResult<Option<Flight>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Bookings on the flight that are not cancelled.
    async fn list_active_for_flight(&self, flight_id: Uuid) -> CoreResult<Vec<Booking>>;

    /// Moves the booking to `to` only while it is in one of `from`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> CoreResult<Option<Booking>>;

    /// Sets the check-in flag while the booking is still `confirmed` and not checked in.
    async fn mark_checked_in(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Option<Booking>>;
}

#[derive(Debug, Clone)]
pub enum Settlement {
    /// This call performed the transition.
    Applied {
        payment: Payment,
        booking: Option<Booking>,
    },
    /// Somebody else already settled it.
    AlreadySettled(Payment),
    NotFound,
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()>;

    async fn find_by_intent(&self, intent_id: &str) -> CoreResult<Option<Payment>>;

    async fn latest_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>>;

    /// Newest first.
    async fn history_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>>;

    /// Payment to `succeeded` and booking to paid/confirmed in one atomic step,
    /// conditional on the payment still being unsettled.
    async fn settle_success(
        &self,
        intent_id: &str,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Settlement>;

    async fn mark_status(
        &self,
        intent_id: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Option<Payment>>;

    /// Reserves the payment for one refund of `amount`, provided it still shows
    /// `expected_status` and `expected_refunded` and no other refund is in flight.
    /// Must succeed before any money moves at the gateway.
    async fn claim_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        amount: Decimal,
    ) -> CoreResult<Option<Payment>>;

    /// Drops a claim whose gateway call failed.
    async fn release_refund(&self, payment_id: Uuid) -> CoreResult<()>;

    /// Applies a claimed refund if the payment still shows `expected_status` and
    /// `expected_refunded`; couples the booking update in the same step.
    async fn record_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        refund: &RefundRecord,
    ) -> CoreResult<Option<(Payment, Option<Booking>)>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> CoreResult<()>;

    async fn update_delivery(
        &self,
        id: Uuid,
        sent: bool,
        error: Option<String>,
    ) -> CoreResult<()>;

    /// Newest first.
    async fn list_notifications_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Notification>>;

    async fn list_notifications_for_booking(
        &self,
        booking_id: Uuid,
    ) -> CoreResult<Vec<Notification>>;

    async fn has_sent(
        &self,
        booking_id: Uuid,
        kind: NotificationType,
        channel: Channel,
    ) -> CoreResult<bool>;
}
