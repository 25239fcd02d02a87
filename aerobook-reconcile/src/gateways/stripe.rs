use async_trait::async_trait;
use std::time::Duration;

use aerobook_core::gateway::{
    GatewayAdapter, GatewayIntent, GatewayRefund, GatewayResult, GatewayStatus, IntentRequest,
    RefundRequest, Verification,
};
use aerobook_core::payment::{Gateway, GatewayPayload, PaymentStatus};

use super::{http_client, minor_units, read_json, require_str, transport_error};

const STRIPE_API: &str = "https://api.stripe.com";
// Stripe only accepts these values in `reason`; anything else goes to metadata.
const STRIPE_REFUND_REASONS: [&str; 3] = ["duplicate", "fraudulent", "requested_by_customer"];

pub fn map_stripe_status(status: &str) -> PaymentStatus {
    match status {
        "succeeded" => PaymentStatus::Succeeded,
        "processing" => PaymentStatus::Processing,
        "canceled" => PaymentStatus::Failed,
        // requires_payment_method, requires_confirmation, requires_action, requires_capture
        _ => PaymentStatus::Created,
    }
}

pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: String, api_base: Option<String>, timeout: Duration) -> GatewayResult<Self> {
        Ok(Self {
            http: http_client(Gateway::Stripe, timeout)?,
            secret_key,
            api_base: api_base.unwrap_or_else(|| STRIPE_API.to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn send_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> GatewayResult<serde_json::Value> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Stripe, e))?;
        read_json(Gateway::Stripe, response).await
    }
}

#[async_trait]
impl GatewayAdapter for StripeGateway {
    fn gateway(&self) -> Gateway {
        Gateway::Stripe
    }

    fn verification(&self) -> Verification {
        Verification::Live
    }

    fn supports_refunds(&self) -> bool {
        true
    }

    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<GatewayIntent> {
        let amount = minor_units(Gateway::Stripe, request.amount)?;

        let mut form = vec![
            ("amount", amount.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("metadata[bookingId]", request.booking_id.to_string()),
            ("metadata[bookingReference]", request.booking_reference.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        if let Some(user_id) = request.user_id {
            form.push(("metadata[userId]", user_id.to_string()));
        }

        let object = self.send_form("payment_intents", &form).await?;
        Ok(GatewayIntent {
            external_id: require_str(Gateway::Stripe, &object, "id")?,
            client_secret: object
                .get("client_secret")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            bank_details: None,
            payload: GatewayPayload::Stripe { object },
        })
    }

    async fn retrieve_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        let response = self
            .http
            .get(self.url(&format!("payment_intents/{}", external_id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| transport_error(Gateway::Stripe, e))?;
        let object = read_json(Gateway::Stripe, response).await?;

        let status = require_str(Gateway::Stripe, &object, "status")?;
        Ok(GatewayStatus {
            status: map_stripe_status(&status),
            payload: GatewayPayload::Stripe { object },
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> GatewayResult<GatewayRefund> {
        let mut form = vec![("payment_intent", request.external_id.clone())];
        if !request.full {
            let amount = minor_units(Gateway::Stripe, request.amount)?;
            form.push(("amount", amount.to_string()));
        }
        match request.reason.as_deref() {
            Some(reason) if STRIPE_REFUND_REASONS.contains(&reason) => {
                form.push(("reason", reason.to_string()));
            }
            Some(reason) => {
                form.push(("reason", "requested_by_customer".to_string()));
                form.push(("metadata[reason]", reason.to_string()));
            }
            None => form.push(("reason", "requested_by_customer".to_string())),
        }

        let payload = self.send_form("refunds", &form).await?;
        Ok(GatewayRefund {
            refund_id: require_str(Gateway::Stripe, &payload, "id")?,
            payload,
        })
    }
}
