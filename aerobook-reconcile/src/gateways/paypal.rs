use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use aerobook_core::gateway::{
    GatewayAdapter, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, GatewayStatus,
    IntentRequest, RefundRequest, Verification,
};
use aerobook_core::payment::{to_major_string, Gateway, GatewayPayload, PaymentStatus};

use super::{http_client, read_json, require_str, transport_error};

// Refresh a little before PayPal says the token expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

pub fn map_paypal_status(status: &str) -> PaymentStatus {
    match status {
        "COMPLETED" => PaymentStatus::Succeeded,
        "APPROVED" => PaymentStatus::Processing,
        "VOIDED" => PaymentStatus::Failed,
        // CREATED, SAVED, PAYER_ACTION_REQUIRED
        _ => PaymentStatus::Created,
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct PaypalGateway {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token: Mutex<Option<AccessToken>>,
}

impl PaypalGateway {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_base: String,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        Ok(Self {
            http: http_client(Gateway::Paypal, timeout)?,
            client_id,
            client_secret,
            api_base,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> GatewayResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(self.url("v1/oauth2/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Paypal, e))?;
        let body = read_json(Gateway::Paypal, response).await?;

        let value = require_str(Gateway::Paypal, &body, "access_token")?;
        let lifetime = body
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_SLACK),
        });
        Ok(value)
    }

    async fn get_order(&self, order_id: &str) -> GatewayResult<serde_json::Value> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.url(&format!("v2/checkout/orders/{}", order_id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Paypal, e))?;
        read_json(Gateway::Paypal, response).await
    }
}

/// The first capture on an order; refunds are issued against it.
fn first_capture_id(order: &serde_json::Value) -> Option<String> {
    order
        .pointer("/purchase_units/0/payments/captures/0/id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl GatewayAdapter for PaypalGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Paypal
    }

    fn verification(&self) -> Verification {
        Verification::Live
    }

    fn supports_refunds(&self) -> bool {
        true
    }

    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<GatewayIntent> {
        let token = self.access_token().await?;
        let order = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.booking_id.to_string(),
                "description": format!("Booking {}", request.booking_reference),
                "amount": {
                    "currency_code": request.currency.to_uppercase(),
                    "value": to_major_string(request.amount),
                },
            }],
        });

        let response = self
            .http
            .post(self.url("v2/checkout/orders"))
            .bearer_auth(token)
            .json(&order)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Paypal, e))?;
        let object = read_json(Gateway::Paypal, response).await?;

        Ok(GatewayIntent {
            external_id: require_str(Gateway::Paypal, &object, "id")?,
            client_secret: None,
            bank_details: None,
            payload: GatewayPayload::Paypal { object },
        })
    }

    async fn retrieve_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let object = self.get_order(external_id).await?;
        let status = require_str(Gateway::Paypal, &object, "status")?;
        Ok(GatewayStatus {
            status: map_paypal_status(&status),
            payload: GatewayPayload::Paypal { object },
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> GatewayResult<GatewayRefund> {
        let order = self.get_order(&request.external_id).await?;
        let capture_id = first_capture_id(&order).ok_or_else(|| {
            GatewayError::provider(
                Gateway::Paypal,
                format!("order {} has no capture to refund", request.external_id),
            )
        })?;

        let mut body = serde_json::json!({});
        if !request.full {
            body["amount"] = serde_json::json!({
                "currency_code": request.currency.to_uppercase(),
                "value": to_major_string(request.amount),
            });
        }
        if let Some(reason) = &request.reason {
            body["note_to_payer"] = serde_json::json!(reason);
        }

        let token = self.access_token().await?;
        let response = self
            .http
            .post(self.url(&format!("v2/payments/captures/{}/refund", capture_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Paypal, e))?;
        let payload = read_json(Gateway::Paypal, response).await?;

        Ok(GatewayRefund {
            refund_id: require_str(Gateway::Paypal, &payload, "id")?,
            payload,
        })
    }
}
