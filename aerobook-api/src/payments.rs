use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use aerobook_reconcile::{
    ConfirmOutcome, CreateIntent, IntentCreated, PaymentHistory, RefundCommand, RefundOutcome,
};

use crate::error::AppError;
use crate::middleware::MaybeUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest {
    payment_intent_id: Option<String>,
    booking_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/create-intent", post(create_intent))
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/refund", post(refund_payment))
        .route("/payments/{booking_id}", get(payment_history))
}

async fn create_intent(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Json(mut req): Json<CreateIntent>,
) -> Result<Json<IntentCreated>, AppError> {
    req.user_id = user_id;
    Ok(Json(state.engine.create_intent(req).await?))
}

async fn confirm_payment(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmOutcome>, AppError> {
    let intent = req
        .payment_intent_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Payment intent ID is required".to_string()))?;

    Ok(Json(state.engine.confirm(&intent, req.booking_id).await?))
}

async fn refund_payment(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Json(req): Json<RefundCommand>,
) -> Result<Json<RefundOutcome>, AppError> {
    Ok(Json(state.engine.refund_for(req, user_id).await?))
}

async fn payment_history(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<PaymentHistory>, AppError> {
    Ok(Json(state.engine.payment_history(booking_id, user_id).await?))
}
