use std::sync::Arc;

use tracing::{info, warn};

use aerobook_core::flight::FlightUpdate;
use aerobook_core::notification::Effect;
use aerobook_core::{CoreError, CoreResult};
use aerobook_shared::models::events::{ChannelMessage, FlightUpdateEvent, RealtimeEvent};

use crate::dispatcher::NotificationDispatcher;
use crate::messages;
use crate::repos::Repositories;

/// Applies airline status pushes and tells everyone holding a live booking.
pub struct FlightStatusService {
    repos: Repositories,
    dispatcher: Arc<NotificationDispatcher>,
}

impl FlightStatusService {
    pub fn new(repos: Repositories, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { repos, dispatcher }
    }

    /// Returns how many bookings were notified.
    pub async fn process_update(&self, update: FlightUpdate) -> CoreResult<usize> {
        if update.flight_number.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Flight number is required".to_string(),
            ));
        }

        let Some(flight) = self.repos.flights.apply_update(&update).await? else {
            warn!("Status update for unknown flight {}", update.flight_number);
            return Ok(0);
        };
        info!("Flight {} is now {}", flight.flight_number, flight.status);

        let bookings = self.repos.bookings.list_active_for_flight(flight.id).await?;
        let mut effects = Vec::with_capacity(bookings.len() * 2);
        for booking in &bookings {
            effects.push(Effect::Notify(messages::flight_changed(booking, &flight)));
            if let Some(user_id) = booking.user_id {
                effects.push(Effect::Push(ChannelMessage {
                    channel: user_id.to_string(),
                    event: RealtimeEvent::FlightUpdate(FlightUpdateEvent {
                        booking_id: booking.id,
                        flight_id: flight.id,
                        status: flight.status.clone(),
                        departure: flight.departure_date,
                        arrival: flight.arrival_date,
                    }),
                }));
            }
        }

        self.dispatcher.dispatch_all(effects).await;
        info!(
            "Flight {} update fanned out to {} booking(s)",
            flight.flight_number,
            bookings.len()
        );
        Ok(bookings.len())
    }
}
