use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::ParticipantStatus,
    dto::score::SessionResults,
    state::lifecycle::{SessionStatus, TastingPhase},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across fan-out rooms and SSE streams.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a name and a pre-serialized data field.
    pub fn new<E>(event: E, data: String) -> Self
    where
        E: Into<Option<String>>,
    {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Closed union of every domain event the core broadcasts. Adding an event
/// means adding a variant here; publish sites cannot invent names.
#[derive(Debug)]
pub enum SessionEvent {
    /// The tasting started; phase clock begins at pour, whiskey 0.
    Started(PhasePayload),
    /// The phase clock moved.
    Advanced(PhasePayload),
    /// The moderator paused the tasting.
    Paused(StatusPayload),
    /// The moderator resumed the tasting.
    Resumed(StatusPayload),
    /// Identities and scores are now visible.
    Reveal(SessionResults),
    /// The session is finished.
    Ended(StatusPayload),
    /// A participant took a seat.
    ParticipantJoined(ParticipantPayload),
    /// A participant left and their scores were removed.
    ParticipantLeft(ParticipantPayload),
    /// A participant signalled readiness.
    ParticipantReady(ParticipantPayload),
    /// A participant updated their own tasting status.
    ParticipantStatus(ParticipantStatusPayload),
    /// A participant locked a score. Carries no score values so the rest of
    /// the table stays blind.
    ScoreLocked(ScoreLockedPayload),
}

impl SessionEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started(_) => "session:started",
            SessionEvent::Advanced(_) => "session:advanced",
            SessionEvent::Paused(_) => "session:paused",
            SessionEvent::Resumed(_) => "session:resumed",
            SessionEvent::Reveal(_) => "session:reveal",
            SessionEvent::Ended(_) => "session:ended",
            SessionEvent::ParticipantJoined(_) => "participant:joined",
            SessionEvent::ParticipantLeft(_) => "participant:left",
            SessionEvent::ParticipantReady(_) => "participant:ready",
            SessionEvent::ParticipantStatus(_) => "participant:status",
            SessionEvent::ScoreLocked(_) => "score:locked",
        }
    }

    /// Serialize into the wire representation used by the fan-out hub.
    pub fn to_server_event(&self) -> serde_json::Result<ServerEvent> {
        let data = match self {
            SessionEvent::Started(payload) | SessionEvent::Advanced(payload) => {
                serde_json::to_string(payload)?
            }
            SessionEvent::Paused(payload)
            | SessionEvent::Resumed(payload)
            | SessionEvent::Ended(payload) => serde_json::to_string(payload)?,
            SessionEvent::Reveal(payload) => serde_json::to_string(payload)?,
            SessionEvent::ParticipantJoined(payload)
            | SessionEvent::ParticipantLeft(payload)
            | SessionEvent::ParticipantReady(payload) => serde_json::to_string(payload)?,
            SessionEvent::ParticipantStatus(payload) => serde_json::to_string(payload)?,
            SessionEvent::ScoreLocked(payload) => serde_json::to_string(payload)?,
        };

        Ok(ServerEvent::new(Some(self.name().to_string()), data))
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the phase clock starts or moves.
pub struct PhasePayload {
    pub phase: TastingPhase,
    pub whiskey_index: usize,
    /// Advisory countdown for the new phase, in seconds.
    pub duration_hint_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on pause/resume/end.
pub struct StatusPayload {
    pub status: SessionStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a participant joins, leaves, or signals readiness.
pub struct ParticipantPayload {
    pub participant_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a participant updates their own status.
pub struct ParticipantStatusPayload {
    pub participant_id: Uuid,
    pub display_name: String,
    pub status: ParticipantStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a score locks. Intentionally omits the score values.
pub struct ScoreLockedPayload {
    pub participant_id: Uuid,
    pub whiskey_id: Uuid,
    pub participant_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the subscribed room (session or user id).
    pub room: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_locked_payload_carries_no_score_values() {
        let event = SessionEvent::ScoreLocked(ScoreLockedPayload {
            participant_id: Uuid::new_v4(),
            whiskey_id: Uuid::new_v4(),
            participant_name: "Sam".to_string(),
        });

        let wire = event.to_server_event().unwrap();
        assert_eq!(wire.event.as_deref(), Some("score:locked"));
        for field in ["nose", "palate", "finish", "overall", "total"] {
            assert!(!wire.data.contains(field), "leaked `{field}` in {}", wire.data);
        }
    }

    #[test]
    fn event_names_are_stable() {
        let payload = StatusPayload {
            status: SessionStatus::Paused,
        };
        assert_eq!(SessionEvent::Paused(payload).name(), "session:paused");
    }
}
