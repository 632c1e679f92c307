use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::ScoreEntity,
    dto::{format_system_time, session::WhiskeySummary},
    state::lifecycle::SessionStatus,
};

/// Payload submitted when a participant locks their score for one whiskey.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitScoreRequest {
    /// The whiskey being scored.
    pub whiskey_id: Uuid,
    /// Nose subscore.
    #[validate(range(min = 1, max = 10, message = "nose must be an integer between 1 and 10"))]
    pub nose: u8,
    /// Palate subscore.
    #[validate(range(min = 1, max = 10, message = "palate must be an integer between 1 and 10"))]
    pub palate: u8,
    /// Finish subscore.
    #[validate(range(min = 1, max = 10, message = "finish must be an integer between 1 and 10"))]
    pub finish: u8,
    /// Overall subscore.
    #[validate(range(min = 1, max = 10, message = "overall must be an integer between 1 and 10"))]
    pub overall: u8,
    /// Free-text nosing notes.
    #[validate(length(max = 1000, message = "nose notes are limited to 1000 characters"))]
    #[serde(default)]
    pub nose_notes: Option<String>,
    /// Free-text palate notes.
    #[validate(length(max = 1000, message = "palate notes are limited to 1000 characters"))]
    #[serde(default)]
    pub palate_notes: Option<String>,
    /// Free-text finish notes.
    #[validate(length(max = 1000, message = "finish notes are limited to 1000 characters"))]
    #[serde(default)]
    pub finish_notes: Option<String>,
    /// Free-text overall notes.
    #[validate(length(max = 1000, message = "overall notes are limited to 1000 characters"))]
    #[serde(default)]
    pub overall_notes: Option<String>,
    /// The participant's guess at the whiskey's identity.
    #[validate(length(max = 200, message = "identity guess is limited to 200 characters"))]
    #[serde(default)]
    pub identity_guess: Option<String>,
}

/// Acknowledgement returned once a score is locked.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreReceipt {
    pub score_id: Uuid,
    /// Weighted total, rounded to one decimal.
    pub total_score: f64,
    /// RFC 3339 timestamp of the lock.
    pub locked_at: String,
}

/// Full projection of one locked score, visible after reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreSummary {
    pub id: Uuid,
    pub participant_id: Uuid,
    /// Display name of the scorer.
    pub participant_name: String,
    pub whiskey_id: Uuid,
    pub nose: u8,
    pub palate: u8,
    pub finish: u8,
    pub overall: u8,
    pub total_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nose_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palate_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_guess: Option<String>,
    pub is_public: bool,
    pub locked_at: String,
}

impl ScoreSummary {
    /// Project an entity, attaching the scorer's display name.
    pub fn from_entity(entity: &ScoreEntity, participant_name: String) -> Self {
        Self {
            id: entity.id,
            participant_id: entity.participant_id,
            participant_name,
            whiskey_id: entity.whiskey_id,
            nose: entity.nose,
            palate: entity.palate,
            finish: entity.finish,
            overall: entity.overall,
            total_score: entity.total_score,
            nose_notes: entity.nose_notes.clone(),
            palate_notes: entity.palate_notes.clone(),
            finish_notes: entity.finish_notes.clone(),
            overall_notes: entity.overall_notes.clone(),
            identity_guess: entity.identity_guess.clone(),
            is_public: entity.is_public,
            locked_at: format_system_time(entity.locked_at),
        }
    }
}

/// Mean of each subscore and of the weighted total across recorded scores,
/// rounded to one decimal.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ScoreAverages {
    pub nose: f64,
    pub palate: f64,
    pub finish: f64,
    pub overall: f64,
    pub total: f64,
}

/// Aggregated results for one whiskey of the flight.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhiskeyResults {
    /// The whiskey with its identity unmasked.
    pub whiskey: WhiskeySummary,
    /// Dense rank by descending mean total; ties share a rank and are
    /// ordered by display number.
    pub rank: u32,
    /// Absent when nobody scored this whiskey.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub averages: Option<ScoreAverages>,
    /// Every locked score with the scorer's display name attached.
    pub scores: Vec<ScoreSummary>,
}

/// Full results of a session, visible once it reaches reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResults {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub whiskeys: Vec<WhiskeyResults>,
}

/// Owner toggle for sharing a score publicly after reveal.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetScoreVisibilityRequest {
    pub is_public: bool,
}
