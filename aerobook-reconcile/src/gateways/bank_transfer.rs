use async_trait::async_trait;

use aerobook_core::gateway::{
    GatewayAdapter, GatewayError, GatewayIntent, GatewayRefund, GatewayResult, GatewayStatus,
    IntentRequest, RefundRequest, Verification,
};
use aerobook_core::payment::{bank_transfer_reference, BankDetails, Gateway, GatewayPayload};

/// Offline transfer to a fixed account. Nothing remote to call; the
/// customer's confirm call is the only settlement signal.
pub struct BankTransferGateway {
    details: BankDetails,
}

impl BankTransferGateway {
    pub fn new(details: BankDetails) -> Self {
        Self { details }
    }
}

#[async_trait]
impl GatewayAdapter for BankTransferGateway {
    fn gateway(&self) -> Gateway {
        Gateway::BankTransfer
    }

    fn verification(&self) -> Verification {
        Verification::ClientAsserted
    }

    fn supports_refunds(&self) -> bool {
        false
    }

    async fn create_intent(&self, _request: &IntentRequest) -> GatewayResult<GatewayIntent> {
        let reference_id = bank_transfer_reference();
        Ok(GatewayIntent {
            external_id: reference_id.clone(),
            client_secret: None,
            bank_details: Some(self.details.clone()),
            payload: GatewayPayload::BankTransfer {
                reference_id,
                account_details: self.details.clone(),
            },
        })
    }

    async fn retrieve_status(&self, _external_id: &str) -> GatewayResult<GatewayStatus> {
        Err(GatewayError::Unsupported {
            gateway: Gateway::BankTransfer,
            operation: "status retrieval",
        })
    }

    async fn create_refund(&self, _request: &RefundRequest) -> GatewayResult<GatewayRefund> {
        Err(GatewayError::Unsupported {
            gateway: Gateway::BankTransfer,
            operation: "refunds",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_core::payment::PaymentMethod;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_intent_carries_reference_and_account() {
        let gateway = BankTransferGateway::new(BankDetails {
            bank_name: "Axis Bank".to_string(),
            account_number: "917020000000001".to_string(),
            ifsc_code: "UTIB0000001".to_string(),
        });
        let intent = gateway
            .create_intent(&IntentRequest {
                booking_id: Uuid::new_v4(),
                booking_reference: "QX7P2M".to_string(),
                user_id: None,
                amount: dec!(4500),
                currency: "INR".to_string(),
                method: PaymentMethod::BankTransfer,
            })
            .await
            .unwrap();

        assert!(intent.external_id.starts_with("BT-"));
        assert!(intent.client_secret.is_none());
        assert_eq!(intent.bank_details.unwrap().ifsc_code, "UTIB0000001");
        assert!(gateway.retrieve_status(&intent.external_id).await.is_err());
    }
}
