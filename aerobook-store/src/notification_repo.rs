use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use aerobook_core::notification::{Channel, Notification, NotificationType};
use aerobook_core::repository::NotificationRepository;
use aerobook_core::CoreResult;

use crate::database::{db_err, parse_column};

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Option<Uuid>,
    booking_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    kind: String,
    channel: String,
    recipient: String,
    subject: String,
    body: String,
    sent: bool,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> CoreResult<Notification> {
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            booking_id: self.booking_id,
            kind: parse_column("type", &self.kind)?,
            channel: parse_column("channel", &self.channel)?,
            to: self.recipient,
            subject: self.subject,
            body: self.body,
            sent: self.sent,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert_notification(&self, notification: &Notification) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, booking_id, type, channel, recipient, subject, body,
                                       sent, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.booking_id)
        .bind(notification.kind.as_str())
        .bind(notification.channel.as_str())
        .bind(&notification.to)
        .bind(&notification.subject)
        .bind(&notification.body)
        .bind(notification.sent)
        .bind(&notification.error)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn update_delivery(&self, id: Uuid, sent: bool, error: Option<String>) -> CoreResult<()> {
        sqlx::query("UPDATE notifications SET sent = $2, error = $3, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(sent)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn list_notifications_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    async fn list_notifications_for_booking(
        &self,
        booking_id: Uuid,
    ) -> CoreResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT * FROM notifications WHERE booking_id = $1 ORDER BY created_at DESC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(NotificationRow::into_notification).collect()
    }

    async fn has_sent(
        &self,
        booking_id: Uuid,
        kind: NotificationType,
        channel: Channel,
    ) -> CoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notifications
                WHERE booking_id = $1 AND type = $2 AND channel = $3 AND sent = TRUE
            )
            "#,
        )
        .bind(booking_id)
        .bind(kind.as_str())
        .bind(channel.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(exists)
    }
}
