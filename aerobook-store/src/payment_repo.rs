use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use aerobook_core::booking::Booking;
use aerobook_core::payment::{GatewayPayload, Payment, PaymentStatus, RefundRecord};
use aerobook_core::repository::{PaymentLedger, Settlement};
use aerobook_core::CoreResult;

use crate::booking_repo::{refund_in_tx, settle_in_tx};
use crate::database::{db_err, parse_column, status_list};

pub struct PostgresPaymentLedger {
    pool: PgPool,
}

impl PostgresPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    user_id: Option<Uuid>,
    gateway: String,
    method: String,
    payment_intent_id: String,
    amount: Decimal,
    currency: String,
    status: String,
    refund_id: Option<String>,
    refund_amount: Option<Decimal>,
    refund_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    refund_pending: Option<Decimal>,
    raw: Json<GatewayPayload>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> CoreResult<Payment> {
        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            user_id: self.user_id,
            gateway: parse_column("gateway", &self.gateway)?,
            method: parse_column("method", &self.method)?,
            payment_intent_id: self.payment_intent_id,
            amount: self.amount,
            currency: self.currency,
            status: parse_column("status", &self.status)?,
            refund_id: self.refund_id,
            refund_amount: self.refund_amount,
            refund_reason: self.refund_reason,
            refunded_at: self.refunded_at,
            refund_pending: self.refund_pending,
            raw: self.raw.0,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, user_id, gateway, method, payment_intent_id, amount, currency,
                                  status, raw, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.user_id)
        .bind(payment.gateway.as_str())
        .bind(payment.method.as_str())
        .bind(&payment.payment_intent_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(Json(&payment.raw))
        .bind(&payment.metadata)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_by_intent(&self, intent_id: &str) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as("SELECT * FROM payments WHERE payment_intent_id = $1")
                .bind(intent_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn latest_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn history_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> =
            sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at DESC")
                .bind(booking_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn settle_success(
        &self,
        intent_id: &str,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Settlement> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated: Option<PaymentRow> = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = 'succeeded', raw = COALESCE($3, raw), updated_at = NOW()
            WHERE payment_intent_id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(intent_id)
        .bind(status_list(PaymentStatus::UNSETTLED))
        .bind(payload.map(Json))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = updated else {
            tx.rollback().await.map_err(db_err)?;
            return match self.find_by_intent(intent_id).await? {
                Some(payment) => Ok(Settlement::AlreadySettled(payment)),
                None => Ok(Settlement::NotFound),
            };
        };

        let payment = row.into_payment()?;
        let booking = settle_in_tx(&mut tx, payment.booking_id, intent_id).await?;
        tx.commit().await.map_err(db_err)?;

        if booking.is_none() {
            warn!(
                "Payment {} settled but booking {} was no longer pending",
                intent_id, payment.booking_id
            );
        }
        info!("Payment {} settled", intent_id);
        Ok(Settlement::Applied { payment, booking })
    }

    async fn mark_status(
        &self,
        intent_id: &str,
        from: &[PaymentStatus],
        to: PaymentStatus,
        payload: Option<GatewayPayload>,
    ) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = $3, raw = COALESCE($4, raw), updated_at = NOW()
            WHERE payment_intent_id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(intent_id)
        .bind(status_list(from))
        .bind(to.as_str())
        .bind(payload.map(Json))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn claim_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        amount: Decimal,
    ) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            UPDATE payments
            SET refund_pending = $4, updated_at = NOW()
            WHERE id = $1
              AND status = $2
              AND COALESCE(refund_amount, 0) = $3
              AND refund_pending IS NULL
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(expected_status.as_str())
        .bind(expected_refunded)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn release_refund(&self, payment_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE payments SET refund_pending = NULL, updated_at = NOW() WHERE id = $1")
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        expected_status: PaymentStatus,
        expected_refunded: Decimal,
        refund: &RefundRecord,
    ) -> CoreResult<Option<(Payment, Option<Booking>)>> {
        let next_status = if refund.full {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated: Option<PaymentRow> = sqlx::query_as(
            r#"
            UPDATE payments
            SET status = $4,
                refund_id = $5,
                refund_amount = $6,
                refund_reason = COALESCE($7, refund_reason),
                refunded_at = $8,
                refund_pending = NULL,
                metadata = jsonb_set(
                    metadata,
                    '{refunds}',
                    COALESCE(metadata->'refunds', '[]'::jsonb) || jsonb_build_array($9::jsonb)
                ),
                updated_at = $8
            WHERE id = $1 AND status = $2 AND COALESCE(refund_amount, 0) = $3
            RETURNING *
            "#,
        )
        .bind(payment_id)
        .bind(expected_status.as_str())
        .bind(expected_refunded)
        .bind(next_status.as_str())
        .bind(&refund.refund_id)
        .bind(refund.total_refunded)
        .bind(&refund.reason)
        .bind(refund.refunded_at)
        .bind(refund.ledger_entry())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = updated else {
            tx.rollback().await.map_err(db_err)?;
            return Ok(None);
        };

        let payment = row.into_payment()?;
        let booking = refund_in_tx(&mut tx, payment.booking_id, refund.full).await?;
        tx.commit().await.map_err(db_err)?;

        info!(
            "Refund {} recorded on payment {} ({})",
            refund.refund_id, payment.payment_intent_id, payment.status
        );
        Ok(Some((payment, booking)))
    }
}
