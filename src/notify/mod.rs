//! Notification bridge: lifecycle events delivered to symbol-scoped rooms
//!
//! Delivery is best-effort and at-most-once; disconnected subscribers miss events.

pub mod hub;
pub mod redis_pubsub;

pub use hub::RoomHub;
pub use redis_pubsub::{run_relay, RedisPublisher, ROOM_PATTERN};

use crate::error::KeeperResult;
use crate::models::LifecycleEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub fn room_for(symbol: &str) -> String {
    format!("stock:{}", symbol)
}

/// An event as it travels over pub/sub and WebSocket frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub room: String,
    pub event: String,
    pub payload: Value,
}

impl EventEnvelope {
    pub fn lifecycle(symbol: &str, event: &LifecycleEvent) -> Self {
        Self {
            room: room_for(symbol),
            event: event.name().to_string(),
            payload: event.payload(symbol),
        }
    }

    /// Client-facing frame: `{"event": name, ...payload}`
    pub fn to_frame(&self) -> Value {
        let mut frame = match &self.payload {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other.clone());
                map
            }
        };
        frame.insert("event".to_string(), Value::String(self.event.clone()));
        Value::Object(frame)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver to every current subscriber of `envelope.room`
    async fn emit(&self, envelope: EventEnvelope) -> KeeperResult<()>;
}

/// Emit a lifecycle event, logging instead of failing when delivery breaks.
pub async fn notify(notifier: &dyn Notifier, symbol: &str, event: LifecycleEvent) {
    let envelope = EventEnvelope::lifecycle(symbol, &event);
    debug!(room = %envelope.room, event = %envelope.event, "Emitting lifecycle event");
    if let Err(e) = notifier.emit(envelope).await {
        warn!(symbol = %symbol, event = event.name(), error = %e, "Failed to emit lifecycle event");
    }
}
