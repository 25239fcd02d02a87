use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    Processing,
    Succeeded,
    Failed,
    Refunded,
    PartiallyRefunded,
}

crate::string_enum!(PaymentStatus, "payment status", {
    Created => "created",
    Processing => "processing",
    Succeeded => "succeeded",
    Failed => "failed",
    Refunded => "refunded",
    PartiallyRefunded => "partially_refunded",
});

impl PaymentStatus {
    /// States from which a success signal may still settle the payment.
    pub const UNSETTLED: &'static [PaymentStatus] = &[
        PaymentStatus::Created,
        PaymentStatus::Processing,
        PaymentStatus::Failed,
    ];

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }

    pub fn is_refundable(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::PartiallyRefunded)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Upi,
    NetBanking,
    Wallet,
    BankTransfer,
}

crate::string_enum!(PaymentMethod, "payment method", {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    Upi => "upi",
    NetBanking => "net_banking",
    Wallet => "wallet",
    BankTransfer => "bank_transfer",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    #[default]
    Stripe,
    Paypal,
    Razorpay,
    BankTransfer,
}

crate::string_enum!(Gateway, "payment gateway", {
    Stripe => "stripe",
    Paypal => "paypal",
    Razorpay => "razorpay",
    BankTransfer => "bank_transfer",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub ifsc_code: String,
}

/// Provider-specific view of a payment, kept verbatim for audits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "gateway", rename_all = "snake_case")]
pub enum GatewayPayload {
    Stripe {
        object: serde_json::Value,
    },
    Paypal {
        object: serde_json::Value,
    },
    Razorpay {
        object: serde_json::Value,
    },
    BankTransfer {
        reference_id: String,
        account_details: BankDetails,
    },
}

impl GatewayPayload {
    pub fn gateway(&self) -> Gateway {
        match self {
            GatewayPayload::Stripe { .. } => Gateway::Stripe,
            GatewayPayload::Paypal { .. } => Gateway::Paypal,
            GatewayPayload::Razorpay { .. } => Gateway::Razorpay,
            GatewayPayload::BankTransfer { .. } => Gateway::BankTransfer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Option<Uuid>,
    pub gateway: Gateway,
    pub method: PaymentMethod,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub refund_id: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Set while a refund is in flight at the gateway; only one may be.
    pub refund_pending: Option<Decimal>,
    pub raw: GatewayPayload,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundPlan {
    pub amount: Decimal,
    pub total_refunded: Decimal,
    pub full: bool,
}

/// What the ledger writes when a refund lands.
#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount: Decimal,
    pub total_refunded: Decimal,
    pub reason: Option<String>,
    pub refunded_at: DateTime<Utc>,
    pub full: bool,
    pub payload: serde_json::Value,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        booking_id: Uuid,
        user_id: Option<Uuid>,
        gateway: Gateway,
        method: PaymentMethod,
        payment_intent_id: String,
        amount: Decimal,
        currency: String,
        raw: GatewayPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            user_id,
            gateway,
            method,
            payment_intent_id,
            amount,
            currency,
            status: PaymentStatus::Created,
            refund_id: None,
            refund_amount: None,
            refund_reason: None,
            refunded_at: None,
            refund_pending: None,
            raw,
            metadata: serde_json::json!({
                "paymentGateway": gateway,
                "paymentMethod": method,
            }),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn refunded_so_far(&self) -> Decimal {
        self.refund_amount.unwrap_or(Decimal::ZERO)
    }

    pub fn refundable_remaining(&self) -> Decimal {
        (self.amount - self.refunded_so_far()).max(Decimal::ZERO)
    }

    /// Validates a refund request against what is left on this payment.
    /// `None` refunds the whole remainder.
    pub fn plan_refund(&self, requested: Option<Decimal>) -> CoreResult<RefundPlan> {
        if !self.status.is_refundable() {
            return Err(CoreError::Conflict(format!(
                "Payment {} cannot be refunded in status {}",
                self.payment_intent_id, self.status
            )));
        }

        if let Some(pending) = self.refund_pending {
            return Err(CoreError::Conflict(format!(
                "Payment {} already has a refund of {} in progress",
                self.payment_intent_id, pending
            )));
        }

        let remaining = self.refundable_remaining();
        let amount = requested.unwrap_or(remaining);
        if amount <= Decimal::ZERO {
            return Err(CoreError::ValidationError(format!(
                "Refund amount must be positive, got {}",
                amount
            )));
        }
        if amount > remaining {
            return Err(CoreError::ValidationError(format!(
                "Refund amount {} exceeds refundable remainder {}",
                amount, remaining
            )));
        }

        let total_refunded = self.refunded_so_far() + amount;
        Ok(RefundPlan {
            amount,
            total_refunded,
            full: total_refunded >= self.amount,
        })
    }

    pub fn apply_refund(&mut self, refund: &RefundRecord) {
        self.status = if refund.full {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.refund_id = Some(refund.refund_id.clone());
        self.refund_amount = Some(refund.total_refunded);
        if refund.reason.is_some() {
            self.refund_reason = refund.reason.clone();
        }
        self.refunded_at = Some(refund.refunded_at);
        self.refund_pending = None;
        self.updated_at = refund.refunded_at;
        push_refund_entry(&mut self.metadata, refund.ledger_entry());
    }
}

impl RefundRecord {
    /// The entry appended to `metadata.refunds`.
    pub fn ledger_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "refundId": self.refund_id,
            "amount": self.amount,
            "reason": self.reason,
            "refundedAt": self.refunded_at,
            "gateway": self.payload,
        })
    }
}

fn push_refund_entry(metadata: &mut serde_json::Value, entry: serde_json::Value) {
    if !metadata.is_object() {
        *metadata = serde_json::json!({});
    }
    if let Some(map) = metadata.as_object_mut() {
        let refunds = map
            .entry("refunds")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        match refunds.as_array_mut() {
            Some(list) => list.push(entry),
            None => *refunds = serde_json::Value::Array(vec![entry]),
        }
    }
}

/// Minor units as sent to card-style processors: `round(amount * 100)`.
pub fn to_minor_units(amount: Decimal) -> CoreResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| CoreError::ValidationError(format!("Amount {} is out of range", amount)))
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Two-decimal major unit string, e.g. `"300.00"`.
pub fn to_major_string(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// `BT-<epoch millis>-<0..999>`
pub fn bank_transfer_reference() -> String {
    local_reference("BT")
}

/// `RF-<epoch millis>-<0..999>`
pub fn local_refund_id() -> String {
    local_reference("RF")
}

fn local_reference(prefix: &str) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}
