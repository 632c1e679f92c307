use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::participant::UpdateParticipantStatusRequest,
    error::AppError,
    routes::extract::ParticipantAuth,
    services::participant_service,
    state::SharedState,
};

/// Seat-level operations a participant performs on their own row.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/ready", post(mark_ready))
        .route("/sessions/{id}/participant", patch(update_participant_status))
        .route("/sessions/{id}/leave", delete(leave_session))
}

/// Signal readiness in the lobby.
#[utoipa::path(
    post,
    path = "/sessions/{id}/ready",
    tag = "participants",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 204, description = "Readiness recorded"),
        (status = 403, description = "Caller is not a participant of this session")
    )
)]
pub async fn mark_ready(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<StatusCode, AppError> {
    participant_service::mark_ready(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Update the caller's own tasting status.
#[utoipa::path(
    patch,
    path = "/sessions/{id}/participant",
    tag = "participants",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = UpdateParticipantStatusRequest,
    responses(
        (status = 204, description = "Status updated"),
        (status = 403, description = "Caller is not a participant of this session")
    )
)]
pub async fn update_participant_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
    Json(payload): Json<UpdateParticipantStatusRequest>,
) -> Result<StatusCode, AppError> {
    participant_service::update_status(&state, &actor, id, payload.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Give up the caller's seat. Their scores are deleted with it; rejoining
/// issues a brand-new identity.
#[utoipa::path(
    delete,
    path = "/sessions/{id}/leave",
    tag = "participants",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 204, description = "Seat released"),
        (status = 403, description = "Caller is not a participant of this session")
    )
)]
pub async fn leave_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<StatusCode, AppError> {
    participant_service::leave(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
