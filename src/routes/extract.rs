//! Request extractors resolving caller identity. Authentication itself lives
//! upstream: the core trusts the `x-user-id` header attached by the auth
//! middleware for user identity, and resolves participant bearer tokens
//! against the store.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::{
    dao::models::ParticipantEntity, error::AppError, services::participant_service,
    state::SharedState,
};

const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user id. Rejects requests the upstream auth middleware
/// did not resolve to a user.
pub struct CurrentUser(pub Uuid);

/// The authenticated user id, when there is one. Anonymous requests pass.
pub struct MaybeUser(pub Option<Uuid>);

/// The participant seat resolved from the `Authorization: Bearer` token.
pub struct ParticipantAuth(pub ParticipantEntity);

/// The participant seat, when a bearer token is present.
pub struct MaybeParticipant(pub Option<ParticipantEntity>);

fn user_id_from(parts: &Parts) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value).ok())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("malformed x-user-id header".into()))
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match user_id_from(parts)? {
            Some(id) => Ok(CurrentUser(id)),
            None => Err(AppError::Unauthorized("missing x-user-id header".into())),
        }
    }
}

impl FromRequestParts<SharedState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_id_from(parts)?))
    }
}

impl FromRequestParts<SharedState> for ParticipantAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Err(AppError::Unauthorized("missing participant token".into()));
        };

        let participant = participant_service::resolve_token(state, &token).await?;
        Ok(ParticipantAuth(participant))
    }
}

impl FromRequestParts<SharedState> for MaybeParticipant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeParticipant(None));
        };

        let participant = participant_service::resolve_token(state, &token).await?;
        Ok(MaybeParticipant(Some(participant)))
    }
}
