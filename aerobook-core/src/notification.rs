use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aerobook_shared::models::events::ChannelMessage;

use crate::booking::{Booking, ContactInfo};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingConfirm,
    PaymentSuccess,
    FlightUpdate,
    BookingRefund,
    BookingCancelled,
}

crate::string_enum!(NotificationType, "notification type", {
    BookingConfirm => "booking_confirm",
    PaymentSuccess => "payment_success",
    FlightUpdate => "flight_update",
    BookingRefund => "booking_refund",
    BookingCancelled => "booking_cancelled",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

crate::string_enum!(Channel, "notification channel", {
    Email => "email",
    Sms => "sms",
    Push => "push",
});

/// One delivery attempt on one channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub channel: Channel,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn pending(request: &NotificationRequest, channel: Channel, to: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            booking_id: request.booking_id,
            kind: request.kind,
            channel,
            to,
            subject: request.subject.clone(),
            body: request.body.clone(),
            sent: false,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub user_id: Option<Uuid>,
    pub booking_id: Option<Uuid>,
    pub kind: NotificationType,
    pub channels: Vec<Channel>,
    pub subject: String,
    pub body: String,
    /// Explicit recipient for every channel; wins over any lookup.
    pub to: Option<String>,
    /// Contact captured on the booking; consulted before the user profile.
    pub contact: ContactInfo,
    /// Skip channels that already delivered this (booking, type).
    pub dedupe: bool,
}

impl NotificationRequest {
    /// Email and SMS to whoever holds the booking.
    pub fn for_booking(
        kind: NotificationType,
        booking: &Booking,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            user_id: booking.user_id,
            booking_id: Some(booking.id),
            kind,
            channels: vec![Channel::Email, Channel::Sms],
            subject: subject.into(),
            body: body.into(),
            to: None,
            contact: booking.contact_info.clone(),
            dedupe: false,
        }
    }

    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to = Some(recipient.into());
        self
    }

    pub fn deduplicated(mut self) -> Self {
        self.dedupe = true;
        self
    }

    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }
}

/// Work to run after a state transition has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(NotificationRequest),
    Push(ChannelMessage),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn publish(&self, message: &ChannelMessage);
}
