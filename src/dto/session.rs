use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{ProofRange, SessionEntity, SessionTheme, WhiskeyEntity},
    dto::{
        format_system_time,
        participant::ParticipantSummary,
        validation::{validate_display_name, validate_proof_range},
    },
    state::lifecycle::{SessionStatus, TastingPhase},
};

/// Payload used to create a brand-new tasting session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Display name of the tasting.
    #[validate(custom(function = validate_display_name))]
    pub name: String,
    /// Theme of the flight.
    pub theme: SessionTheme,
    /// Label carried when the theme is custom.
    #[validate(length(max = 50))]
    #[serde(default)]
    pub custom_theme: Option<String>,
    /// Optional proof bracket announced to participants.
    #[validate(nested)]
    #[serde(default)]
    pub proof_range: Option<ProofRangeInput>,
    /// RFC 3339 timestamp the tasting is scheduled for.
    #[serde(default)]
    pub scheduled_for: Option<String>,
    /// Seat cap for the lobby.
    #[validate(range(min = 2, max = 64))]
    #[serde(default)]
    pub max_participants: Option<u32>,
    /// Create the session as a staged draft instead of an open lobby.
    #[serde(default)]
    pub draft: bool,
    /// Display name the moderator takes at the table.
    #[validate(custom(function = validate_display_name))]
    pub moderator_name: String,
    /// The flight, in pouring order.
    #[validate(length(max = 20), nested)]
    #[serde(default)]
    pub whiskeys: Vec<WhiskeyInput>,
}

/// Incoming proof bracket for the session bootstrap.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProofRangeInput {
    pub min: f32,
    pub max: f32,
}

impl Validate for ProofRangeInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_proof_range(self.min, self.max) {
            errors.add("proof_range", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl From<ProofRangeInput> for ProofRange {
    fn from(value: ProofRangeInput) -> Self {
        Self {
            min: value.min,
            max: value.max,
        }
    }
}

/// One whiskey supplied when building a flight.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct WhiskeyInput {
    /// True name of the bottling, hidden until reveal.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Producing distillery, hidden until reveal.
    #[validate(length(min = 1, max = 100))]
    pub distillery: String,
    /// Age statement in years.
    #[validate(range(min = 1, max = 99))]
    #[serde(default)]
    pub age_years: Option<u8>,
    /// Bottling proof.
    #[validate(range(min = 1.0, max = 200.0))]
    pub proof: f32,
    /// Retail price.
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub price: Option<f64>,
    /// Mashbill description.
    #[validate(length(max = 200))]
    #[serde(default)]
    pub mashbill: Option<String>,
    /// Region or state of origin.
    #[validate(length(max = 100))]
    #[serde(default)]
    pub region: Option<String>,
    /// Pour size per participant in milliliters. Defaults to 30 ml.
    #[validate(range(min = 5.0, max = 120.0))]
    #[serde(default)]
    pub pour_size_ml: Option<f32>,
}

/// Moderator payload for the advance operation. Both fields empty means
/// "next phase in the cycle".
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdvanceRequest {
    /// Jump directly to this phase.
    #[serde(default)]
    pub phase: Option<TastingPhase>,
    /// Jump directly to this whiskey index.
    #[serde(default)]
    pub whiskey_index: Option<usize>,
}

/// Identity half of a whiskey, withheld from non-moderators until reveal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhiskeyIdentity {
    pub name: String,
    pub distillery: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_years: Option<u8>,
    pub proof: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mashbill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl From<&WhiskeyEntity> for WhiskeyIdentity {
    fn from(entity: &WhiskeyEntity) -> Self {
        Self {
            name: entity.name.clone(),
            distillery: entity.distillery.clone(),
            age_years: entity.age_years,
            proof: entity.proof,
            price: entity.price,
            mashbill: entity.mashbill.clone(),
            region: entity.region.clone(),
        }
    }
}

/// Public projection of a whiskey. While the tasting is blind the identity
/// block is absent and only the display number and pour size are shown.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WhiskeySummary {
    pub id: Uuid,
    /// Position in the flight, 1..N.
    pub display_number: u32,
    pub pour_size_ml: f32,
    /// Present for moderators and once the session reaches reveal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<WhiskeyIdentity>,
}

impl WhiskeySummary {
    /// Project an entity, including the identity block only when permitted.
    pub fn from_entity(entity: &WhiskeyEntity, include_identity: bool) -> Self {
        Self {
            id: entity.id,
            display_number: entity.display_number,
            pour_size_ml: entity.pour_size_ml,
            identity: include_identity.then(|| WhiskeyIdentity::from(entity)),
        }
    }
}

/// Full projection of a session returned by create/join/get.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: Uuid,
    pub invite_code: String,
    pub name: String,
    pub theme: SessionTheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_range: Option<ProofRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<String>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<TastingPhase>,
    pub current_whiskey_index: usize,
    pub moderator_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    /// Advisory countdown for the current phase, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_timer_hint_secs: Option<u64>,
    pub whiskeys: Vec<WhiskeySummary>,
    pub participants: Vec<ParticipantSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionSummary {
    /// Assemble a summary from storage entities. `include_identities`
    /// controls the blind filter on the whiskey list.
    pub fn assemble(
        session: &SessionEntity,
        whiskeys: &[WhiskeyEntity],
        participants: Vec<ParticipantSummary>,
        include_identities: bool,
        phase_timer_hint_secs: Option<u64>,
    ) -> Self {
        Self {
            id: session.id,
            invite_code: session.invite_code.clone(),
            name: session.name.clone(),
            theme: session.theme,
            custom_theme: session.custom_theme.clone(),
            proof_range: session.proof_range,
            scheduled_for: session.scheduled_for.map(format_system_time),
            status: session.status,
            current_phase: session.current_phase,
            current_whiskey_index: session.current_whiskey_index,
            moderator_id: session.moderator_id,
            max_participants: session.max_participants,
            phase_timer_hint_secs,
            whiskeys: whiskeys
                .iter()
                .map(|w| WhiskeySummary::from_entity(w, include_identities))
                .collect(),
            participants,
            created_at: format_system_time(session.created_at),
            updated_at: format_system_time(session.updated_at),
        }
    }
}

/// Response returned when a session has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session: SessionSummary,
    /// The moderator's seat at their own table.
    pub participant_id: Uuid,
    /// Bearer token authorizing the moderator's participant calls.
    pub participant_token: String,
}
