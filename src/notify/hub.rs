//! In-process rooms backed by broadcast channels

use super::{EventEnvelope, Notifier};
use crate::error::KeeperResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

const ROOM_CAPACITY: usize = 64;

#[derive(Default)]
pub struct RoomHub {
    rooms: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `room`; events emitted after this call are delivered to the receiver.
    pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<EventEnvelope> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    pub async fn subscriber_count(&self, room: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map_or(0, |tx| tx.receiver_count())
    }
}

#[async_trait]
impl Notifier for RoomHub {
    async fn emit(&self, envelope: EventEnvelope) -> KeeperResult<()> {
        let mut rooms = self.rooms.write().await;
        let Some(tx) = rooms.get(&envelope.room) else {
            return Ok(());
        };
        let room = envelope.room.clone();
        if tx.send(envelope).is_err() {
            // every subscriber left
            rooms.remove(&room);
            debug!(room = %room, "RoomHub: dropped empty room");
        }
        Ok(())
    }
}
