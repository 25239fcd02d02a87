use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payment::{BankDetails, Gateway, GatewayPayload, PaymentMethod, PaymentStatus};
use crate::CoreError;

/// How far the server can trust a gateway's own status reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// A status-retrieval call exists; client confirmations are re-checked.
    Live,
    /// No server-side check exists; the confirm call is the settlement signal.
    ClientAsserted,
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub user_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub external_id: String,
    pub client_secret: Option<String>,
    pub bank_details: Option<BankDetails>,
    pub payload: GatewayPayload,
}

#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub status: PaymentStatus,
    pub payload: GatewayPayload,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub external_id: String,
    pub amount: Decimal,
    pub full: bool,
    pub currency: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{gateway} did not answer within {seconds}s")]
    Timeout { gateway: Gateway, seconds: u64 },
    #[error("{gateway} does not support {operation}")]
    Unsupported {
        gateway: Gateway,
        operation: &'static str,
    },
    #[error("{gateway}: {message}")]
    Provider { gateway: Gateway, message: String },
}

impl GatewayError {
    pub fn provider(gateway: Gateway, message: impl Into<String>) -> Self {
        GatewayError::Provider {
            gateway,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout { gateway, seconds } => CoreError::GatewayError {
                gateway: gateway.to_string(),
                message: format!("timed out after {}s", seconds),
            },
            GatewayError::Unsupported { gateway, operation } => CoreError::GatewayError {
                gateway: gateway.to_string(),
                message: format!("{} is not supported", operation),
            },
            GatewayError::Provider { gateway, message } => CoreError::GatewayError {
                gateway: gateway.to_string(),
                message,
            },
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Uniform surface over every payment backend.
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn gateway(&self) -> Gateway;

    fn verification(&self) -> Verification;

    fn supports_refunds(&self) -> bool;

    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<GatewayIntent>;

    async fn retrieve_status(&self, external_id: &str) -> GatewayResult<GatewayStatus>;

    async fn create_refund(&self, request: &RefundRequest) -> GatewayResult<GatewayRefund>;
}
