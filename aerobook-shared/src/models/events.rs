use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pushed to a user's realtime channel when a flight they hold a booking on changes.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightUpdateEvent {
    pub booking_id: Uuid,
    pub flight_id: Uuid,
    pub status: String,
    pub departure: DateTime<Utc>,
    pub arrival: Option<DateTime<Utc>>,
}

/// Envelope for everything published on a per-user channel.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum RealtimeEvent {
    FlightUpdate(FlightUpdateEvent),
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::FlightUpdate(_) => "flightUpdate",
        }
    }
}

/// A realtime event addressed to one channel (the channel name is the user id).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ChannelMessage {
    pub channel: String,
    pub event: RealtimeEvent,
}
