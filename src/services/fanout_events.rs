//! Typed fan-out helpers. Everything the core broadcasts goes through the
//! closed [`SessionEvent`] union, so publish sites cannot invent event names
//! or payload shapes.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::events::SessionEvent,
    state::{RoomId, SharedState},
};

/// Broadcast a domain event to everyone subscribed to a session's room.
/// Best-effort: serialization failures are logged and swallowed, and a
/// missing room (nobody listening) is not an error.
pub fn broadcast_to_session(state: &SharedState, session_id: Uuid, event: &SessionEvent) {
    publish(state, RoomId::Session(session_id), event);
}

/// Send a direct notification to one user's room.
pub fn notify_user(state: &SharedState, user_id: Uuid, event: &SessionEvent) {
    publish(state, RoomId::User(user_id), event);
}

fn publish(state: &SharedState, room: RoomId, event: &SessionEvent) {
    match event.to_server_event() {
        Ok(wire) => state.fanout().publish(room, wire),
        Err(err) => warn!(
            event = event.name(),
            error = %err,
            "failed to serialize fan-out payload"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dto::events::{ParticipantPayload, StatusPayload},
        state::{AppState, SessionStatus},
    };

    #[tokio::test]
    async fn session_events_reach_session_subscribers() {
        let state = AppState::new(AppConfig::default());
        let session_id = Uuid::new_v4();
        let mut rx = state.fanout().subscribe(RoomId::Session(session_id));

        broadcast_to_session(
            &state,
            session_id,
            &SessionEvent::ParticipantJoined(ParticipantPayload {
                participant_id: Uuid::new_v4(),
                display_name: "Rye Guy".to_string(),
            }),
        );

        let received = rx.try_recv().unwrap();
        assert_eq!(received.event.as_deref(), Some("participant:joined"));
    }

    #[tokio::test]
    async fn user_notifications_reach_user_rooms_only() {
        let state = AppState::new(AppConfig::default());
        let user_id = Uuid::new_v4();
        let mut user_rx = state.fanout().subscribe(RoomId::User(user_id));
        let mut other_rx = state.fanout().subscribe(RoomId::User(Uuid::new_v4()));

        notify_user(
            &state,
            user_id,
            &SessionEvent::Ended(StatusPayload {
                status: SessionStatus::Completed,
            }),
        );

        assert_eq!(
            user_rx.try_recv().unwrap().event.as_deref(),
            Some("session:ended")
        );
        assert!(other_rx.try_recv().is_err());
    }
}
