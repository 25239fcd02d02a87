use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use aerobook_core::gateway::{
    GatewayAdapter, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, GatewayStatus,
    IntentRequest, RefundRequest, Verification,
};
use aerobook_core::payment::{Gateway, GatewayPayload, PaymentStatus};

/// Scriptable stand-in for a remote processor. Only built for tests and the
/// `test-util` feature.
pub struct MockGateway {
    gateway: Gateway,
    verification: Verification,
    refunds: bool,
    reported: AtomicU8,
    failing: AtomicBool,
    delay: Option<Duration>,
    intents: AtomicUsize,
    status_checks: AtomicUsize,
    refund_calls: AtomicUsize,
}

impl MockGateway {
    /// A live processor that reports `succeeded` on every status check.
    pub fn live(gateway: Gateway) -> Self {
        Self {
            gateway,
            verification: Verification::Live,
            refunds: true,
            reported: AtomicU8::new(status_index(PaymentStatus::Succeeded)),
            failing: AtomicBool::new(false),
            delay: None,
            intents: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
        }
    }

    pub fn client_asserted(gateway: Gateway) -> Self {
        Self {
            verification: Verification::ClientAsserted,
            refunds: false,
            ..Self::live(gateway)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn report(&self, status: PaymentStatus) {
        self.reported.store(status_index(status), Ordering::SeqCst);
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn intents_created(&self) -> usize {
        self.intents.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    pub fn refunds_issued(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }

    fn reported(&self) -> PaymentStatus {
        let index = self.reported.load(Ordering::SeqCst) as usize;
        PaymentStatus::ALL
            .get(index)
            .copied()
            .unwrap_or(PaymentStatus::Created)
    }

    async fn call(&self) -> GatewayResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::provider(self.gateway, "scripted failure"));
        }
        Ok(())
    }

    fn payload(&self, object: serde_json::Value) -> GatewayPayload {
        match self.gateway {
            Gateway::Paypal => GatewayPayload::Paypal { object },
            Gateway::Razorpay => GatewayPayload::Razorpay { object },
            _ => GatewayPayload::Stripe { object },
        }
    }
}

fn status_index(status: PaymentStatus) -> u8 {
    PaymentStatus::ALL
        .iter()
        .position(|s| *s == status)
        .unwrap_or(0) as u8
}

#[async_trait]
impl GatewayAdapter for MockGateway {
    fn gateway(&self) -> Gateway {
        self.gateway
    }

    fn verification(&self) -> Verification {
        self.verification
    }

    fn supports_refunds(&self) -> bool {
        self.refunds
    }

    async fn create_intent(&self, request: &IntentRequest) -> GatewayResult<GatewayIntent> {
        self.call().await?;
        let n = self.intents.fetch_add(1, Ordering::SeqCst) + 1;
        let external_id = format!("mock_{}_{}_{}", self.gateway, request.booking_reference, n);

        Ok(GatewayIntent {
            client_secret: Some(format!("{}_secret", external_id)),
            bank_details: None,
            payload: self.payload(serde_json::json!({
                "id": external_id,
                "amount": request.amount,
                "currency": request.currency,
            })),
            external_id,
        })
    }

    async fn retrieve_status(&self, external_id: &str) -> GatewayResult<GatewayStatus> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        self.call().await?;
        let status = self.reported();
        Ok(GatewayStatus {
            status,
            payload: self.payload(serde_json::json!({
                "id": external_id,
                "status": status.as_str(),
            })),
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> GatewayResult<GatewayRefund> {
        if !self.refunds {
            return Err(GatewayError::Unsupported {
                gateway: self.gateway,
                operation: "refunds",
            });
        }
        self.call().await?;
        let n = self.refund_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let refund_id = format!("mock_re_{}", n);
        Ok(GatewayRefund {
            payload: serde_json::json!({
                "id": refund_id,
                "intent": request.external_id,
                "amount": request.amount,
            }),
            refund_id,
        })
    }
}
