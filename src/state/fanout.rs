use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::events::ServerEvent;

/// Key of a fan-out room. Session rooms carry the lifecycle and scoring
/// events for everyone at the table; user rooms carry direct notifications
/// for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// All participants of one session.
    Session(Uuid),
    /// A single registered user, across sessions.
    User(Uuid),
}

/// Broadcast hub fanning events out to every subscriber of a room.
///
/// Rooms are created lazily on first subscription and dropped again once a
/// publish finds no listeners, so idle sessions cost nothing.
pub struct FanoutHub {
    rooms: DashMap<RoomId, broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl FanoutHub {
    /// Build a hub whose per-room channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Register a subscriber for `room`, creating the room if needed.
    pub fn subscribe(&self, room: RoomId) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send an event to every current subscriber of `room`. Delivery is
    /// best-effort; a room with no listeners is pruned instead.
    pub fn publish(&self, room: RoomId, event: ServerEvent) {
        let Some(sender) = self.rooms.get(&room).map(|entry| entry.clone()) else {
            return;
        };

        if sender.send(event).is_err() {
            self.rooms
                .remove_if(&room, |_, sender| sender.receiver_count() == 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent {
            event: Some(name.to_string()),
            data: "{}".to_string(),
        }
    }

    #[test]
    fn rooms_are_isolated() {
        let hub = FanoutHub::new(8);
        let session = RoomId::Session(Uuid::new_v4());
        let user = RoomId::User(Uuid::new_v4());

        let mut session_rx = hub.subscribe(session);
        let mut user_rx = hub.subscribe(user);

        hub.publish(session, event("session:started"));

        assert_eq!(
            session_rx.try_recv().unwrap().event.as_deref(),
            Some("session:started")
        );
        assert!(user_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub = FanoutHub::new(8);
        hub.publish(RoomId::Session(Uuid::new_v4()), event("session:ended"));
    }

    #[test]
    fn abandoned_rooms_are_pruned_on_publish() {
        let hub = FanoutHub::new(8);
        let room = RoomId::Session(Uuid::new_v4());

        drop(hub.subscribe(room));
        hub.publish(room, event("session:paused"));

        assert!(hub.rooms.get(&room).is_none());
    }
}
