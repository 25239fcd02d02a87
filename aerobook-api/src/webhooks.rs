use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use aerobook_core::flight::FlightUpdate;
use aerobook_core::CoreError;
use aerobook_reconcile::webhook::{parse_event, GatewayEvent};

use crate::error::AppError;
use crate::state::AppState;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/webhooks/airline", post(handle_airline_update))
}

/// POST /webhooks/stripe
/// The raw body is needed for signature verification, so no Json extractor.
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let verifier = state
        .stripe_webhook
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Stripe webhooks are not configured".to_string()))?;

    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| CoreError::SignatureInvalid("missing stripe-signature header".to_string()))?;
    verifier.verify(signature, &body, chrono::Utc::now().timestamp())?;

    let event = parse_event(&body)?;
    if let GatewayEvent::PaymentSucceeded { intent_id, .. } = &event {
        info!("Received payment_intent.succeeded for {}", intent_id);
    }
    state.engine.handle_gateway_event(event).await?;

    Ok(Json(json!({ "received": true })))
}

/// POST /webhooks/airline
/// Trusted status push from the airline's operations system.
async fn handle_airline_update(
    State(state): State<AppState>,
    Json(update): Json<FlightUpdate>,
) -> Result<Json<Value>, AppError> {
    let notified = state.flights.process_update(update).await?;
    Ok(Json(json!({ "success": true, "notified": notified })))
}
