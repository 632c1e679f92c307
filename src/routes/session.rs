use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        participant::{JoinSessionRequest, JoinSessionResponse},
        score::SessionResults,
        session::{
            AdvanceRequest, CreateSessionRequest, CreateSessionResponse, SessionSummary,
            WhiskeyInput, WhiskeySummary,
        },
    },
    error::AppError,
    routes::extract::{CurrentUser, MaybeParticipant, MaybeUser, ParticipantAuth},
    services::{lifecycle_service, participant_service, session_service},
    state::SharedState,
};

/// Session bootstrap and the moderator-only lifecycle transitions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/join", post(join_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/whiskeys", post(add_whiskey))
        .route("/sessions/{id}/open", post(open_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/advance", post(advance_session))
        .route("/sessions/{id}/pause", post(pause_session))
        .route("/sessions/{id}/resume", post(resume_session))
        .route("/sessions/{id}/reveal", post(reveal_session))
        .route("/sessions/{id}/end", post(end_session))
}

/// Create a session with its flight and seat the creator as moderator.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("x-user-id" = String, Header, description = "User id resolved by the auth middleware")),
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    CurrentUser(moderator_id): CurrentUser,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let response = session_service::create_session(&state, moderator_id, payload).await?;
    Ok(Json(response))
}

/// Take a seat at a session via its invite code.
#[utoipa::path(
    post,
    path = "/sessions/join",
    tag = "sessions",
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Seat taken", body = JoinSessionResponse),
        (status = 404, description = "Unknown invite code"),
        (status = 409, description = "Lobby closed or session full")
    )
)]
pub async fn join_session(
    State(state): State<SharedState>,
    MaybeUser(user_id): MaybeUser,
    Valid(Json(payload)): Valid<Json<JoinSessionRequest>>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    let response = participant_service::join(&state, payload, user_id).await?;
    Ok(Json(response))
}

/// Fetch a session summary. Whiskey identities stay blind-filtered for
/// non-moderators until the reveal.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    MaybeParticipant(viewer): MaybeParticipant,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::get_session(&state, id, viewer.as_ref()).await?;
    Ok(Json(summary))
}

/// Delete a staged session. Drafts only.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session to delete")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 409, description = "Session is no longer a draft")
    )
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append a whiskey to the flight before the tasting starts.
#[utoipa::path(
    post,
    path = "/sessions/{id}/whiskeys",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = WhiskeyInput,
    responses(
        (status = 200, description = "Whiskey added", body = WhiskeySummary),
        (status = 409, description = "Flight is locked")
    )
)]
pub async fn add_whiskey(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
    Valid(Json(payload)): Valid<Json<WhiskeyInput>>,
) -> Result<Json<WhiskeySummary>, AppError> {
    let summary = session_service::add_whiskey(&state, &actor, id, payload).await?;
    Ok(Json(summary))
}

/// Open a draft session's lobby for joins.
#[utoipa::path(
    post,
    path = "/sessions/{id}/open",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Lobby opened", body = SessionSummary),
        (status = 409, description = "Not a draft")
    )
)]
pub async fn open_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = lifecycle_service::open(&state, &actor, id).await?;
    Ok(Json(summary))
}

/// Start the tasting: the phase clock begins at pour on the first whiskey.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Tasting started", body = SessionSummary),
        (status = 403, description = "Caller is not the moderator"),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = lifecycle_service::start(&state, &actor, id).await?;
    Ok(Json(summary))
}

/// Move the phase clock forward, or jump to a named phase/whiskey. An empty
/// body means "next phase in the cycle".
#[utoipa::path(
    post,
    path = "/sessions/{id}/advance",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body(content = AdvanceRequest, description = "Optional phase/whiskey target"),
    responses(
        (status = 200, description = "Phase advanced", body = SessionSummary),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn advance_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
    payload: Option<Json<AdvanceRequest>>,
) -> Result<Json<SessionSummary>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let summary = lifecycle_service::advance(&state, &actor, id, request).await?;
    Ok(Json(summary))
}

/// Pause the tasting without touching phase or index.
#[utoipa::path(
    post,
    path = "/sessions/{id}/pause",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Tasting paused", body = SessionSummary),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn pause_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = lifecycle_service::pause(&state, &actor, id).await?;
    Ok(Json(summary))
}

/// Resume a paused tasting.
#[utoipa::path(
    post,
    path = "/sessions/{id}/resume",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Tasting resumed", body = SessionSummary),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn resume_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = lifecycle_service::resume(&state, &actor, id).await?;
    Ok(Json(summary))
}

/// Expose the true whiskey identities and everyone's scores. Irreversible.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reveal",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session revealed", body = SessionResults),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn reveal_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionResults>, AppError> {
    let results = lifecycle_service::reveal(&state, &actor, id).await?;
    Ok(Json(results))
}

/// Finalize the session. Terminal.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    tag = "sessions",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session ended", body = SessionSummary),
        (status = 409, description = "Invalid transition")
    )
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = lifecycle_service::end(&state, &actor, id).await?;
    Ok(Json(summary))
}
