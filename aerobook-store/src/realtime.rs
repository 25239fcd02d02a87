use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error};

use aerobook_core::notification::RealtimePublisher;
use aerobook_shared::models::events::ChannelMessage;

use crate::RedisClient;

const HUB_CAPACITY: usize = 256;

/// Per-user realtime fan-out: in-process subscribers, plus Redis when configured.
#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<ChannelMessage>,
    redis: Option<RedisClient>,
}

impl RealtimeHub {
    pub fn new(redis: Option<RedisClient>) -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx, redis }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl RealtimePublisher for RealtimeHub {
    async fn publish(&self, message: &ChannelMessage) {
        // Err only means nobody is listening right now.
        match self.tx.send(message.clone()) {
            Ok(n) => debug!("Realtime {} -> {} local subscribers", message.event.name(), n),
            Err(_) => debug!("Realtime {} dropped: no local subscribers", message.event.name()),
        }

        if let Some(redis) = &self.redis {
            let payload = match serde_json::to_string(&message.event) {
                Ok(p) => p,
                Err(e) => {
                    error!("Failed to serialize realtime event: {}", e);
                    return;
                }
            };
            if let Err(e) = redis.publish(&message.channel, &payload).await {
                error!("Redis publish to {} failed: {}", message.channel, e);
            }
        }
    }
}
