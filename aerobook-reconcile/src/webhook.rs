use hmac::{Hmac, Mac};
use sha2::Sha256;

use aerobook_core::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Checks `t=<ts>,v1=<hex>` headers signed over `"<ts>.<raw body>"`.
#[derive(Clone)]
pub struct StripeSignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl StripeSignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }

    pub fn verify(&self, header: &str, body: &[u8], now: i64) -> CoreResult<()> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| CoreError::SignatureInvalid("missing timestamp".to_string()))?;
        if candidates.is_empty() {
            return Err(CoreError::SignatureInvalid("missing v1 signature".to_string()));
        }
        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(CoreError::SignatureInvalid(format!(
                "timestamp {} outside the {}s tolerance",
                timestamp, self.tolerance_secs
            )));
        }

        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            // verify_slice compares in constant time
            if signer(&self.secret, timestamp, body)?.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(CoreError::SignatureInvalid("no matching signature".to_string()))
    }
}

fn signer(secret: &str, timestamp: i64, body: &[u8]) -> CoreResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::InternalError(format!("webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Hex signature for a payload, as the sender computes it.
pub fn compute_signature(secret: &str, timestamp: i64, body: &[u8]) -> CoreResult<String> {
    Ok(hex::encode(signer(secret, timestamp, body)?.finalize().into_bytes()))
}

/// The webhook events the engine acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    PaymentSucceeded {
        intent_id: String,
        object: serde_json::Value,
    },
    Processing {
        intent_id: String,
        object: serde_json::Value,
    },
    PaymentFailed {
        intent_id: String,
        object: serde_json::Value,
    },
    Ignored {
        event_type: String,
    },
}

pub fn parse_event(body: &[u8]) -> CoreResult<GatewayEvent> {
    let event: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| CoreError::ValidationError(format!("Malformed webhook body: {}", e)))?;

    let event_type = event
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| CoreError::ValidationError("Webhook event has no type".to_string()))?
        .to_string();

    let known = matches!(
        event_type.as_str(),
        "payment_intent.succeeded"
            | "payment_intent.processing"
            | "payment_intent.payment_failed"
            | "payment_intent.canceled"
    );
    if !known {
        return Ok(GatewayEvent::Ignored { event_type });
    }

    let object = event
        .pointer("/data/object")
        .cloned()
        .ok_or_else(|| CoreError::ValidationError(format!("{} has no data.object", event_type)))?;
    let intent_id = object
        .get("id")
        .and_then(|id| id.as_str())
        .ok_or_else(|| CoreError::ValidationError(format!("{} has no intent id", event_type)))?
        .to_string();

    Ok(match event_type.as_str() {
        "payment_intent.succeeded" => GatewayEvent::PaymentSucceeded { intent_id, object },
        "payment_intent.processing" => GatewayEvent::Processing { intent_id, object },
        _ => GatewayEvent::PaymentFailed { intent_id, object },
    })
}
