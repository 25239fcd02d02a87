use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use aerobook_core::booking::{Booking, BookingStatus, NewBooking};
use aerobook_core::flight::Flight;
use aerobook_core::notification::Effect;
use aerobook_core::{CoreError, CoreResult};

use crate::dispatcher::NotificationDispatcher;
use crate::messages;
use crate::repos::Repositories;

/// Booking lifecycle that needs no gateway: creation, lookup, check-in
/// and cancellation of unpaid bookings.
pub struct BookingManager {
    repos: Repositories,
    dispatcher: Arc<NotificationDispatcher>,
}

impl BookingManager {
    pub fn new(repos: Repositories, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { repos, dispatcher }
    }

    pub async fn create(&self, flight_id: Uuid, request: NewBooking) -> CoreResult<Booking> {
        let flight = self
            .repos
            .flights
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Flight {}", flight_id)))?;
        self.create_for_flight(&flight, request).await
    }

    pub async fn create_for_flight(&self, flight: &Flight, request: NewBooking) -> CoreResult<Booking> {
        let owner = match request.user_id {
            Some(id) => self.repos.users.get_user(id).await?,
            None => None,
        };

        let booking = Booking::new(flight, request, owner.as_ref())?;
        self.repos.bookings.create_booking(&booking).await?;

        info!(
            "Booking {} created on {} for {} passenger(s), total {}",
            booking.reference,
            flight.flight_number,
            booking.passengers.len(),
            booking.total_price
        );
        Ok(booking)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Booking> {
        self.repos
            .bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", id)))
    }

    /// Owned bookings are only visible to their owner; guest bookings to anyone holding the id.
    pub async fn get_for(&self, id: Uuid, requester: Option<Uuid>) -> CoreResult<Booking> {
        let booking = self.get(id).await?;
        match booking.user_id {
            Some(owner) if requester != Some(owner) => {
                Err(CoreError::NotFound(format!("Booking {}", id)))
            }
            _ => Ok(booking),
        }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        self.repos.bookings.list_for_user(user_id).await
    }

    pub async fn check_in(&self, id: Uuid, requester: Option<Uuid>) -> CoreResult<Booking> {
        let booking = self.get_for(id, requester).await?;
        booking.ensure_check_in_allowed()?;

        let updated = self
            .repos
            .bookings
            .mark_checked_in(id, Utc::now())
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!(
                    "Booking {} changed during check-in",
                    booking.reference
                ))
            })?;

        info!("Booking {} checked in", updated.reference);
        Ok(updated)
    }

    /// Cancels without touching money. Callers route paid bookings through a refund.
    pub async fn cancel(&self, id: Uuid) -> CoreResult<Booking> {
        let booking = self.get(id).await?;
        booking.ensure_cancellable()?;

        let (cancelled, effects) = self.cancel_transition(&booking).await?;
        self.dispatcher.dispatch_all(effects).await;
        Ok(cancelled)
    }

    async fn cancel_transition(&self, booking: &Booking) -> CoreResult<(Booking, Vec<Effect>)> {
        let cancelled = self
            .repos
            .bookings
            .transition_status(
                booking.id,
                &[
                    BookingStatus::Booked,
                    BookingStatus::Confirmed,
                    BookingStatus::CheckedIn,
                ],
                BookingStatus::Cancelled,
            )
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Booking {} is already cancelled", booking.reference))
            })?;

        info!("Booking {} cancelled", cancelled.reference);
        let effects = vec![Effect::Notify(messages::cancelled(&cancelled))];
        Ok((cancelled, effects))
    }
}
