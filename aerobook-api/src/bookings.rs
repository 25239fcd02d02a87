use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use aerobook_core::booking::{Booking, CabinClass, ContactInfo, NewBooking, Passenger};

use crate::error::AppError;
use crate::middleware::{AuthUser, MaybeUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    flight_id: Uuid,
    #[serde(default)]
    passengers: Vec<Passenger>,
    cabin_class: Option<String>,
    #[serde(default)]
    contact_info: ContactInfo,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/check-in", post(check_in))
}

async fn create_booking(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let cabin_class: CabinClass = match req.cabin_class.as_deref() {
        Some(c) => c.parse()?,
        None => CabinClass::default(),
    };

    let booking = state
        .engine
        .bookings()
        .create(
            req.flight_id,
            NewBooking {
                user_id,
                passengers: req.passengers,
                cabin_class,
                contact_info: req.contact_info,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.engine.bookings().list_for_user(user_id).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.bookings().get_for(id, user_id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.cancel_booking(id, user_id).await?;
    info!("Booking {} cancelled via API", booking.reference);
    Ok(Json(booking))
}

async fn check_in(
    State(state): State<AppState>,
    MaybeUser(user_id): MaybeUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.engine.bookings().check_in(id, user_id).await?))
}
