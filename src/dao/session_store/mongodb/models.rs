use mongodb::bson::{Binary, Bson, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ParticipantEntity, ParticipantStatus, ProofRange, ScoreEntity, SessionEntity, SessionTheme,
    WhiskeyEntity,
};
use crate::state::lifecycle::{SessionStatus, TastingPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    invite_code: String,
    name: String,
    theme: SessionTheme,
    custom_theme: Option<String>,
    proof_range: Option<ProofRange>,
    scheduled_for: Option<DateTime>,
    status: SessionStatus,
    current_phase: Option<TastingPhase>,
    current_whiskey_index: i64,
    moderator_id: Uuid,
    max_participants: Option<u32>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: value.id,
            invite_code: value.invite_code,
            name: value.name,
            theme: value.theme,
            custom_theme: value.custom_theme,
            proof_range: value.proof_range,
            scheduled_for: value.scheduled_for.map(DateTime::from_system_time),
            status: value.status,
            current_phase: value.current_phase,
            current_whiskey_index: value.current_whiskey_index as i64,
            moderator_id: value.moderator_id,
            max_participants: value.max_participants,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: value.id,
            invite_code: value.invite_code,
            name: value.name,
            theme: value.theme,
            custom_theme: value.custom_theme,
            proof_range: value.proof_range,
            scheduled_for: value.scheduled_for.map(DateTime::to_system_time),
            status: value.status,
            current_phase: value.current_phase,
            current_whiskey_index: value.current_whiskey_index as usize,
            moderator_id: value.moderator_id,
            max_participants: value.max_participants,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoWhiskeyDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    display_number: u32,
    name: String,
    distillery: String,
    age_years: Option<u8>,
    proof: f32,
    price: Option<f64>,
    mashbill: Option<String>,
    region: Option<String>,
    pour_size_ml: f32,
}

impl From<WhiskeyEntity> for MongoWhiskeyDocument {
    fn from(value: WhiskeyEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            display_number: value.display_number,
            name: value.name,
            distillery: value.distillery,
            age_years: value.age_years,
            proof: value.proof,
            price: value.price,
            mashbill: value.mashbill,
            region: value.region,
            pour_size_ml: value.pour_size_ml,
        }
    }
}

impl From<MongoWhiskeyDocument> for WhiskeyEntity {
    fn from(value: MongoWhiskeyDocument) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            display_number: value.display_number,
            name: value.name,
            distillery: value.distillery,
            age_years: value.age_years,
            proof: value.proof,
            price: value.price,
            mashbill: value.mashbill,
            region: value.region,
            pour_size_ml: value.pour_size_ml,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoParticipantDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    user_id: Option<Uuid>,
    display_name: String,
    status: ParticipantStatus,
    is_ready: bool,
    current_whiskey_index: i64,
    token: String,
    joined_at: DateTime,
}

impl From<ParticipantEntity> for MongoParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            user_id: value.user_id,
            display_name: value.display_name,
            status: value.status,
            is_ready: value.is_ready,
            current_whiskey_index: value.current_whiskey_index as i64,
            token: value.token,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<MongoParticipantDocument> for ParticipantEntity {
    fn from(value: MongoParticipantDocument) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            user_id: value.user_id,
            display_name: value.display_name,
            status: value.status,
            is_ready: value.is_ready,
            current_whiskey_index: value.current_whiskey_index as usize,
            token: value.token,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoScoreDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    session_id: Uuid,
    whiskey_id: Uuid,
    participant_id: Uuid,
    nose: u8,
    palate: u8,
    finish: u8,
    overall: u8,
    total_score: f64,
    nose_notes: Option<String>,
    palate_notes: Option<String>,
    finish_notes: Option<String>,
    overall_notes: Option<String>,
    identity_guess: Option<String>,
    is_public: bool,
    locked_at: DateTime,
}

impl From<ScoreEntity> for MongoScoreDocument {
    fn from(value: ScoreEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            whiskey_id: value.whiskey_id,
            participant_id: value.participant_id,
            nose: value.nose,
            palate: value.palate,
            finish: value.finish,
            overall: value.overall,
            total_score: value.total_score,
            nose_notes: value.nose_notes,
            palate_notes: value.palate_notes,
            finish_notes: value.finish_notes,
            overall_notes: value.overall_notes,
            identity_guess: value.identity_guess,
            is_public: value.is_public,
            locked_at: DateTime::from_system_time(value.locked_at),
        }
    }
}

impl From<MongoScoreDocument> for ScoreEntity {
    fn from(value: MongoScoreDocument) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            whiskey_id: value.whiskey_id,
            participant_id: value.participant_id,
            nose: value.nose,
            palate: value.palate,
            finish: value.finish,
            overall: value.overall,
            total_score: value.total_score,
            nose_notes: value.nose_notes,
            palate_notes: value.palate_notes,
            finish_notes: value.finish_notes,
            overall_notes: value.overall_notes,
            identity_guess: value.identity_guess,
            is_public: value.is_public,
            locked_at: value.locked_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// BSON value of an optional phase, matching the serialized document field.
pub fn phase_bson(phase: Option<TastingPhase>) -> Bson {
    match phase {
        Some(phase) => Bson::String(phase.as_str().to_owned()),
        None => Bson::Null,
    }
}
