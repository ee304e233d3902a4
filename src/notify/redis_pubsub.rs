//! Cross-process event delivery over Redis pub/sub
//!
//! Workers publish envelopes to channel `stock:<symbol>`; each api-server relays
//! the `stock:*` pattern into its local [`RoomHub`].

use super::{EventEnvelope, Notifier, RoomHub};
use crate::error::{KeeperError, KeeperResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ROOM_PATTERN: &str = "stock:*";

#[derive(Clone)]
pub struct RedisPublisher {
    conn: ConnectionManager,
}

impl RedisPublisher {
    pub async fn connect(redis_url: &str) -> KeeperResult<Self> {
        let client = Client::open(redis_url).map_err(|e| KeeperError::Config(e.to_string()))?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Notifier for RedisPublisher {
    async fn emit(&self, envelope: EventEnvelope) -> KeeperResult<()> {
        let message = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&envelope.room, message).await?;
        debug!(room = %envelope.room, event = %envelope.event, receivers, "Published event");
        Ok(())
    }
}

/// Forward every published envelope into `hub` until the subscription ends.
pub async fn run_relay(redis_url: &str, hub: Arc<RoomHub>) -> KeeperResult<()> {
    let client = Client::open(redis_url).map_err(|e| KeeperError::Config(e.to_string()))?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(ROOM_PATTERN).await?;
    info!(pattern = ROOM_PATTERN, "Event relay subscribed");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let raw: String = match msg.get_payload() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Event relay: unreadable payload");
                continue;
            }
        };
        match serde_json::from_str::<EventEnvelope>(&raw) {
            Ok(envelope) => hub.emit(envelope).await?,
            Err(e) => warn!(error = %e, channel = %msg.get_channel_name(), "Event relay: malformed envelope"),
        }
    }

    warn!("Event relay: subscription stream ended");
    Ok(())
}
