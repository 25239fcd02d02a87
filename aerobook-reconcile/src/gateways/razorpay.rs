use async_trait::async_trait;
use std::time::Duration;

use aerobook_core::gateway::{
    GatewayAdapter, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, GatewayStatus,
    IntentRequest, RefundRequest, Verification,
};
use aerobook_core::payment::{Gateway, GatewayPayload, PaymentStatus};

use super::{http_client, minor_units, read_json, require_str, transport_error};

const RAZORPAY_API: &str = "https://api.razorpay.com/v1";

pub fn map_razorpay_status(status: &str) -> PaymentStatus {
    match status {
        "paid" => PaymentStatus::Succeeded,
        "attempted" => PaymentStatus::Processing,
        _ => PaymentStatus::Created,
    }
}

pub struct RazorpayGateway {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

impl RazorpayGateway {
    pub fn new(
        key_id: String,
        key_secret: String,
        api_base: Option<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        Ok(Self {
            http: http_client(Gateway::Razorpay, timeout)?,
            key_id,
            key_secret,
            api_base: api_base.unwrap_or_else(|| RAZORPAY_API.to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str) -> GatewayResult<serde_json::Value> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Razorpay, e))?;
        read_json(Gateway::Razorpay, response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> GatewayResult<serde_json::Value> {
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Razorpay, e))?;
        read_json(Gateway::Razorpay, response).await
    }
}

fn captured_payment_id(payments: &serde_json::Value) -> Option<String> {
    payments
        .get("items")
        .and_then(|items| items.as_array())?
        .iter()
        .find(|p| p.get("status").and_then(|s| s.as_str()) == Some("captured"))
        .and_then(|p| p.get("id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
}

#[async_trait]
impl GatewayAdapter for RazorpayGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Razorpay
    }

    fn verification(&self) -> Verification {
        Verification::Live
    }

    fn supports_refunds(&self) -> bool {
        true
    }

    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<GatewayIntent> {
        let mut notes = serde_json::json!({
            "bookingId": request.booking_id.to_string(),
            "bookingReference": request.booking_reference,
        });
        if let Some(user_id) = request.user_id {
            notes["userId"] = serde_json::json!(user_id.to_string());
        }

        let body = serde_json::json!({
            "amount": minor_units(Gateway::Razorpay, request.amount)?,
            "currency": request.currency.to_uppercase(),
            "receipt": format!("booking_{}", request.booking_id),
            "notes": notes,
        });
        let object = self.post("orders", &body).await?;

        Ok(GatewayIntent {
            external_id: require_str(Gateway::Razorpay, &object, "id")?,
            client_secret: None,
            bank_details: None,
            payload: GatewayPayload::Razorpay { object },
        })
    }

    async fn retrieve_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let object = self.get(&format!("orders/{}", external_id)).await?;
        let status = require_str(Gateway::Razorpay, &object, "status")?;
        Ok(GatewayStatus {
            status: map_razorpay_status(&status),
            payload: GatewayPayload::Razorpay { object },
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> GatewayResult<GatewayRefund> {
        let payments = self
            .get(&format!("orders/{}/payments", request.external_id))
            .await?;
        let payment_id = captured_payment_id(&payments).ok_or_else(|| {
            GatewayError::provider(
                Gateway::Razorpay,
                format!("order {} has no captured payment", request.external_id),
            )
        })?;

        let mut body = serde_json::json!({});
        if !request.full {
            body["amount"] = serde_json::json!(minor_units(Gateway::Razorpay, request.amount)?);
        }
        if let Some(reason) = &request.reason {
            body["notes"] = serde_json::json!({ "reason": reason });
        }

        let payload = self
            .post(&format!("payments/{}/refund", payment_id), &body)
            .await?;
        Ok(GatewayRefund {
            refund_id: require_str(Gateway::Razorpay, &payload, "id")?,
            payload,
        })
    }
}
