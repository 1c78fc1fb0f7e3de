//! Per-user rooms for live pushes.
//!
//! Delivery is best effort: an event published to a room nobody has joined
//! is dropped, and a subscriber that falls more than [`ROOM_CAPACITY`] events
//! behind loses the oldest ones. Clients reconcile through the persisted
//! notifications.

use std::sync::Arc;

use bson::oid::ObjectId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{api::v1::notification::NotificationResponse, util::ObjectIdString};

pub const ROOM_CAPACITY: usize = 64;

/// Frames sent from the server to a connected client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Joined { room: ObjectIdString },
    NewNotification(NotificationResponse),
    Notification(NotificationResponse),
    Pong,
    Error { message: String },
}

/// Frames a client may send.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        #[serde(rename = "userId")]
        user_id: ObjectIdString,
    },
    Leave,
    Ping,
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    rooms: Arc<DashMap<ObjectId, broadcast::Sender<ServerEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, user_id: ObjectId) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Drops the room once its last subscriber is gone.
    pub fn prune(&self, user_id: ObjectId) {
        self.rooms
            .remove_if(&user_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Pushes `event` to everyone in the user's room and returns how many
    /// subscribers it reached.
    pub fn publish(&self, user_id: ObjectId, event: ServerEvent) -> usize {
        let Some(room) = self.rooms.get(&user_id) else {
            tracing::trace!(%user_id, "no live room, push skipped");
            return 0;
        };

        room.send(event).unwrap_or(0)
    }

    pub fn is_connected(&self, user_id: ObjectId) -> bool {
        self.rooms
            .get(&user_id)
            .map(|it| it.receiver_count() > 0)
            .unwrap_or(false)
    }
}
