use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use aerobook_core::notification::Notification;

use crate::error::AppError;
use crate::middleware::auth::ensure_self;
use crate::middleware::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/users/{user_id}/notifications", get(list_notifications))
}

/// Newest first.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Notification>>, AppError> {
    ensure_self(auth, user_id)?;
    Ok(Json(state.notifications.list_notifications_for_user(user_id).await?))
}
