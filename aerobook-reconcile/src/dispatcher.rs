use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use aerobook_core::notification::{
    Channel, Effect, Notification, NotificationRequest, NotificationTransport, RealtimePublisher,
};
use aerobook_core::repository::{NotificationRepository, UserRepository};
use aerobook_core::user::User;
use aerobook_shared::models::events::ChannelMessage;
use aerobook_shared::pii::Masked;

/// Fans typed events out to channels and records one row per attempt.
/// Never fails: delivery and storage problems end up on the row or in the log.
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    transports: HashMap<Channel, Arc<dyn NotificationTransport>>,
    realtime: Option<Arc<dyn RealtimePublisher>>,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            notifications,
            users,
            transports: HashMap::new(),
            realtime: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transports.insert(transport.channel(), transport);
        self
    }

    pub fn with_realtime(mut self, publisher: Arc<dyn RealtimePublisher>) -> Self {
        self.realtime = Some(publisher);
        self
    }

    /// Runs the effects a committed transition produced, in order.
    pub async fn dispatch_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(request) => {
                    self.enqueue(request).await;
                }
                Effect::Push(message) => self.publish(&message).await,
            }
        }
    }

    pub async fn publish(&self, message: &ChannelMessage) {
        match &self.realtime {
            Some(publisher) => publisher.publish(message).await,
            None => warn!(
                "No realtime publisher; dropping {} for {}",
                message.event.name(),
                message.channel
            ),
        }
    }

    pub async fn enqueue(&self, request: NotificationRequest) -> Vec<Notification> {
        let profile = self.load_profile(&request).await;
        let mut records = Vec::with_capacity(request.channels.len());

        for channel in request.channels.iter().copied() {
            if request.dedupe && self.already_sent(&request, channel).await {
                info!(
                    "Skipping {} {} for booking {:?}: already delivered",
                    request.kind, channel, request.booking_id
                );
                continue;
            }

            let Some(to) = resolve_recipient(&request, channel, profile.as_ref()) else {
                let mut record = Notification::pending(&request, channel, String::new());
                record.error = Some(format!("No {} recipient could be resolved", channel));
                warn!("{} {} not sent: no recipient", request.kind, channel);
                self.store(&record).await;
                records.push(record);
                continue;
            };

            let mut record = Notification::pending(&request, channel, to);
            self.store(&record).await;
            self.deliver(&mut record).await;
            records.push(record);
        }

        records
    }

    async fn deliver(&self, record: &mut Notification) {
        let outcome = match self.transports.get(&record.channel) {
            Some(transport) => transport
                .send(&record.to, &record.subject, &record.body)
                .await
                .map_err(|e| e.to_string()),
            None => Err(format!("No {} transport configured", record.channel)),
        };

        match outcome {
            Ok(()) => {
                record.sent = true;
                info!(
                    "Delivered {} via {} to {}",
                    record.kind,
                    record.channel,
                    Masked(&record.to)
                );
            }
            Err(message) => {
                error!("{} via {} failed: {}", record.kind, record.channel, message);
                record.error = Some(message);
            }
        }
        record.updated_at = chrono::Utc::now();

        if let Err(e) = self
            .notifications
            .update_delivery(record.id, record.sent, record.error.clone())
            .await
        {
            error!("Failed to record delivery of notification {}: {}", record.id, e);
        }
    }

    async fn store(&self, record: &Notification) {
        if let Err(e) = self.notifications.insert_notification(record).await {
            error!("Failed to store notification {}: {}", record.id, e);
        }
    }

    async fn already_sent(&self, request: &NotificationRequest, channel: Channel) -> bool {
        let Some(booking_id) = request.booking_id else {
            return false;
        };
        match self
            .notifications
            .has_sent(booking_id, request.kind, channel)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                error!("Dedupe lookup failed for booking {}: {}", booking_id, e);
                false
            }
        }
    }

    async fn load_profile(&self, request: &NotificationRequest) -> Option<User> {
        let user_id = request.user_id?;
        match self.users.get_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to load profile {}: {}", user_id, e);
                None
            }
        }
    }
}

/// Override first, then the booking's contact, then the user profile.
/// Push always targets the user id.
fn resolve_recipient(
    request: &NotificationRequest,
    channel: Channel,
    profile: Option<&User>,
) -> Option<String> {
    if channel == Channel::Push {
        return request.user_id.map(|id| id.to_string());
    }
    if let Some(to) = request.to.as_ref().filter(|t| !t.trim().is_empty()) {
        return Some(to.clone());
    }

    let from_contact = match channel {
        Channel::Email => request.contact.email.clone(),
        _ => request.contact.phone.clone(),
    };
    from_contact
        .filter(|v| !v.trim().is_empty())
        .or_else(|| match channel {
            Channel::Email => profile.map(|u| u.email.clone()),
            _ => profile.and_then(|u| u.phone.clone()),
        })
        .filter(|v| !v.trim().is_empty())
}
