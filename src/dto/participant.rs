use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ParticipantEntity, ParticipantStatus},
    dto::{session::SessionSummary, validation::validate_display_name},
};

/// Payload used to take a seat at a session via its invite code.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinSessionRequest {
    /// Human-entered join code; normalized before lookup.
    #[validate(length(min = 1, max = 16))]
    pub invite_code: String,
    /// Name shown to the rest of the table.
    #[validate(custom(function = validate_display_name))]
    pub display_name: String,
}

/// Public projection of a participant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ParticipantSummary {
    pub id: Uuid,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub is_ready: bool,
    /// The participant's own progress through the flight.
    pub current_whiskey_index: usize,
    pub is_moderator: bool,
}

impl ParticipantSummary {
    /// Project an entity; `moderator_id` is the owning session's moderator.
    pub fn from_entity(entity: &ParticipantEntity, moderator_id: Uuid) -> Self {
        Self {
            id: entity.id,
            display_name: entity.display_name.clone(),
            status: entity.status,
            is_ready: entity.is_ready,
            current_whiskey_index: entity.current_whiskey_index,
            is_moderator: entity.user_id == Some(moderator_id),
        }
    }
}

/// Response returned once a seat has been taken.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinSessionResponse {
    pub participant_id: Uuid,
    /// Bearer token authorizing this seat's subsequent calls.
    pub participant_token: String,
    pub is_moderator: bool,
    pub session: SessionSummary,
}

/// Participant-initiated status update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateParticipantStatusRequest {
    pub status: ParticipantStatus,
}
