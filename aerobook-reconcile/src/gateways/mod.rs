pub mod bank_transfer;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod paypal;
pub mod razorpay;
pub mod stripe;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use aerobook_core::gateway::{GatewayAdapter, GatewayError, GatewayResult};
use aerobook_core::payment::{to_minor_units, BankDetails, Gateway};
use aerobook_core::{CoreError, CoreResult};
use aerobook_store::app_config::Config;

pub use bank_transfer::BankTransferGateway;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockGateway;
pub use paypal::PaypalGateway;
pub use razorpay::RazorpayGateway;
pub use stripe::StripeGateway;

/// Configured adapters keyed by gateway. A gateway absent here is unavailable.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    adapters: HashMap<Gateway, Arc<dyn GatewayAdapter>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn GatewayAdapter>) {
        self.adapters.insert(adapter.gateway(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn GatewayAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn find(&self, gateway: Gateway) -> Option<Arc<dyn GatewayAdapter>> {
        self.adapters.get(&gateway).cloned()
    }

    pub fn get(&self, gateway: Gateway) -> CoreResult<Arc<dyn GatewayAdapter>> {
        self.find(gateway)
            .ok_or_else(|| CoreError::GatewayUnavailable(gateway.to_string()))
    }

    pub fn configured(&self) -> Vec<Gateway> {
        Gateway::ALL
            .iter()
            .copied()
            .filter(|g| self.adapters.contains_key(g))
            .collect()
    }

    /// Builds one client per gateway whose credentials are present.
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        let timeout = Duration::from_secs(config.payments.gateway_timeout_seconds);
        let gateways = &config.gateways;
        let mut registry = Self::new();

        registry.register(Arc::new(BankTransferGateway::new(BankDetails {
            bank_name: config.bank.bank_name.clone(),
            account_number: config.bank.account_number.clone(),
            ifsc_code: config.bank.ifsc_code.clone(),
        })));

        if let (true, Some(key)) = (gateways.stripe.is_configured(), &gateways.stripe.secret_key) {
            let adapter = StripeGateway::new(key.clone(), gateways.stripe.api_base.clone(), timeout)?;
            registry.register(Arc::new(adapter));
        }

        if let (true, Some(id), Some(secret)) = (
            gateways.paypal.is_configured(),
            &gateways.paypal.client_id,
            &gateways.paypal.client_secret,
        ) {
            let adapter = PaypalGateway::new(
                id.clone(),
                secret.clone(),
                gateways.paypal.api_base().to_string(),
                timeout,
            )?;
            registry.register(Arc::new(adapter));
        }

        if let (true, Some(id), Some(secret)) = (
            gateways.razorpay.is_configured(),
            &gateways.razorpay.key_id,
            &gateways.razorpay.key_secret,
        ) {
            let adapter = RazorpayGateway::new(id.clone(), secret.clone(), None, timeout)?;
            registry.register(Arc::new(adapter));
        }

        info!("Payment gateways available: {:?}", registry.configured());
        Ok(registry)
    }
}

pub(crate) fn http_client(gateway: Gateway, timeout: Duration) -> GatewayResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::provider(gateway, format!("HTTP client: {}", e)))
}

pub(crate) fn transport_error(gateway: Gateway, err: reqwest::Error) -> GatewayError {
    GatewayError::provider(gateway, format!("request failed: {}", err))
}

/// Decodes a provider response, turning non-2xx bodies into provider errors.
pub(crate) async fn read_json(
    gateway: Gateway,
    response: reqwest::Response,
) -> GatewayResult<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| GatewayError::provider(gateway, format!("unreadable response: {}", e)))?;

    if !status.is_success() {
        let message = provider_message(&body).unwrap_or_else(|| body.to_string());
        return Err(GatewayError::provider(
            gateway,
            format!("HTTP {}: {}", status.as_u16(), message),
        ));
    }
    Ok(body)
}

// Stripe and Razorpay nest the message under `error`, PayPal keeps it top level.
fn provider_message(body: &serde_json::Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.pointer("/error/description"))
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub(crate) fn minor_units(gateway: Gateway, amount: rust_decimal::Decimal) -> GatewayResult<i64> {
    to_minor_units(amount).map_err(|e| GatewayError::provider(gateway, e.to_string()))
}

pub(crate) fn require_str(
    gateway: Gateway,
    body: &serde_json::Value,
    field: &str,
) -> GatewayResult<String> {
    body.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::provider(gateway, format!("response missing '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reports_unconfigured_gateways() {
        let registry = GatewayRegistry::new().with(Arc::new(BankTransferGateway::new(BankDetails {
            bank_name: "HDFC Bank".to_string(),
            account_number: "5010001".to_string(),
            ifsc_code: "HDFC0000001".to_string(),
        })));

        assert!(registry.get(Gateway::BankTransfer).is_ok());
        assert!(matches!(
            registry.get(Gateway::Razorpay),
            Err(CoreError::GatewayUnavailable(g)) if g == "razorpay"
        ));
        assert_eq!(registry.configured(), vec![Gateway::BankTransfer]);
    }

    #[test]
    fn test_provider_message_extraction() {
        let stripe = serde_json::json!({"error": {"message": "No such payment_intent"}});
        let razorpay = serde_json::json!({"error": {"description": "Order id does not exist"}});
        let paypal = serde_json::json!({"name": "RESOURCE_NOT_FOUND", "message": "Order not found"});

        assert_eq!(provider_message(&stripe).unwrap(), "No such payment_intent");
        assert_eq!(provider_message(&razorpay).unwrap(), "Order id does not exist");
        assert_eq!(provider_message(&paypal).unwrap(), "Order not found");
    }
}
