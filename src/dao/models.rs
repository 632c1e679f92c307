use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::lifecycle::{Lifecycle, SessionStatus, TastingPhase};

/// Theme chosen for a tasting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionTheme {
    Bourbon,
    Scotch,
    Rye,
    Irish,
    Japanese,
    /// Mixed flight spanning regions and styles.
    World,
    /// Free-form theme; the session carries a custom label.
    Custom,
}

/// Optional proof bracket the session's whiskeys fall into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProofRange {
    /// Lowest proof in the flight.
    pub min: f32,
    /// Highest proof in the flight.
    pub max: f32,
}

/// Aggregate session entity persisted by the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Human-entered join code, unique across sessions.
    pub invite_code: String,
    /// Display name of the tasting.
    pub name: String,
    /// Theme of the flight.
    pub theme: SessionTheme,
    /// Label carried when the theme is custom.
    pub custom_theme: Option<String>,
    /// Optional proof bracket announced to participants.
    pub proof_range: Option<ProofRange>,
    /// When the tasting is scheduled to happen.
    pub scheduled_for: Option<SystemTime>,
    /// Lifecycle status; written only through the lifecycle service.
    pub status: SessionStatus,
    /// Current tasting phase while active/paused.
    pub current_phase: Option<TastingPhase>,
    /// Index of the whiskey currently on the table (or one-past-the-end).
    pub current_whiskey_index: usize,
    /// User id of the moderator who created the session.
    pub moderator_id: Uuid,
    /// Seat cap for the lobby, when set.
    pub max_participants: Option<u32>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the session row was updated.
    pub updated_at: SystemTime,
}

impl SessionEntity {
    /// The mutable lifecycle slice of this row.
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle {
            status: self.status,
            phase: self.current_phase,
            whiskey_index: self.current_whiskey_index,
        }
    }

    /// Copy of this row with the given lifecycle applied. Read-model
    /// projection only; persistence goes through the conditional update.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.status = lifecycle.status;
        self.current_phase = lifecycle.phase;
        self.current_whiskey_index = lifecycle.whiskey_index;
        self
    }
}

/// One whiskey in a session's flight. Identity fields are withheld from
/// non-moderators until the session reaches reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiskeyEntity {
    /// Primary key of the whiskey.
    pub id: Uuid,
    /// Session this whiskey belongs to.
    pub session_id: Uuid,
    /// Position in the flight, 1..N, stable for the session.
    pub display_number: u32,
    /// True name of the bottling.
    pub name: String,
    /// Producing distillery.
    pub distillery: String,
    /// Age statement in years, when the bottle carries one.
    pub age_years: Option<u8>,
    /// Bottling proof.
    pub proof: f32,
    /// Retail price, when known.
    pub price: Option<f64>,
    /// Mashbill description.
    pub mashbill: Option<String>,
    /// Region or state of origin.
    pub region: Option<String>,
    /// Pour size per participant, in milliliters.
    pub pour_size_ml: f32,
}

/// Tasting progress of a single participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Joined but not tasting yet.
    Waiting,
    /// Working through the flight.
    Tasting,
    /// Scored every whiskey.
    Completed,
}

impl ParticipantStatus {
    /// Stable snake_case name, matching the serialized representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::Waiting => "waiting",
            ParticipantStatus::Tasting => "tasting",
            ParticipantStatus::Completed => "completed",
        }
    }
}

/// One seat at a tasting session, optionally linked to a user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEntity {
    /// Primary key of the participant.
    pub id: Uuid,
    /// Session this seat belongs to.
    pub session_id: Uuid,
    /// Linked user account; `None` for anonymous guests.
    pub user_id: Option<Uuid>,
    /// Name shown to the rest of the table.
    pub display_name: String,
    /// Personal tasting progress.
    pub status: ParticipantStatus,
    /// Whether the participant has signalled readiness in the lobby.
    pub is_ready: bool,
    /// The participant's own progress through the flight, independent of the
    /// session's global index in moderator-paced mode.
    pub current_whiskey_index: usize,
    /// Opaque bearer token authorizing this seat's calls.
    pub token: String,
    /// When the seat was taken.
    pub joined_at: SystemTime,
}

/// A locked score for one (participant, whiskey) pair. Immutable after
/// insert except for the `is_public` toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntity {
    /// Primary key of the score.
    pub id: Uuid,
    /// Session the score belongs to.
    pub session_id: Uuid,
    /// Whiskey being scored.
    pub whiskey_id: Uuid,
    /// Participant who locked the score.
    pub participant_id: Uuid,
    /// Nose subscore, 1..=10.
    pub nose: u8,
    /// Palate subscore, 1..=10.
    pub palate: u8,
    /// Finish subscore, 1..=10.
    pub finish: u8,
    /// Overall subscore, 1..=10.
    pub overall: u8,
    /// Weighted total, rounded to one decimal.
    pub total_score: f64,
    /// Free-text nosing notes.
    pub nose_notes: Option<String>,
    /// Free-text palate notes.
    pub palate_notes: Option<String>,
    /// Free-text finish notes.
    pub finish_notes: Option<String>,
    /// Free-text overall notes.
    pub overall_notes: Option<String>,
    /// The participant's guess at the whiskey's identity.
    pub identity_guess: Option<String>,
    /// Whether the owner shares this score publicly after reveal.
    pub is_public: bool,
    /// Moment the score became immutable.
    pub locked_at: SystemTime,
}
