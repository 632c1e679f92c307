use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::score::{
        ScoreReceipt, ScoreSummary, SessionResults, SetScoreVisibilityRequest, SubmitScoreRequest,
    },
    error::AppError,
    routes::extract::{CurrentUser, ParticipantAuth},
    services::score_service,
    state::SharedState,
};

/// Score submission and the reveal-gated results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/scores", post(submit_score))
        .route("/sessions/{id}/results", get(session_results))
        .route("/scores/{id}/visibility", patch(set_score_visibility))
}

/// Lock a score for one whiskey. A second submission for the same whiskey is
/// rejected as a conflict.
#[utoipa::path(
    post,
    path = "/sessions/{id}/scores",
    tag = "scores",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = SubmitScoreRequest,
    responses(
        (status = 200, description = "Score locked", body = ScoreReceipt),
        (status = 403, description = "Caller is not a participant of this session"),
        (status = 409, description = "Duplicate score or session not active")
    )
)]
pub async fn submit_score(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
    Valid(Json(payload)): Valid<Json<SubmitScoreRequest>>,
) -> Result<Json<ScoreReceipt>, AppError> {
    let receipt = score_service::submit(&state, &actor, id, payload).await?;
    Ok(Json(receipt))
}

/// Aggregated results with true identities. Members only, once the session
/// has reached reveal.
#[utoipa::path(
    get,
    path = "/sessions/{id}/results",
    tag = "scores",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session results", body = SessionResults),
        (status = 403, description = "Results are hidden until the reveal")
    )
)]
pub async fn session_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Json<SessionResults>, AppError> {
    let results = score_service::get_results(&state, &actor, id).await?;
    Ok(Json(results))
}

/// Toggle whether a locked score is shared publicly. Owner only, post-reveal.
#[utoipa::path(
    patch,
    path = "/scores/{id}/visibility",
    tag = "scores",
    params(("x-user-id" = String, Header, description = "User id resolved by the auth middleware"),
    ("id" = String, Path, description = "Identifier of the score")),
    request_body = SetScoreVisibilityRequest,
    responses(
        (status = 200, description = "Visibility updated", body = ScoreSummary),
        (status = 403, description = "Caller does not own the score"),
        (status = 409, description = "Session has not revealed yet")
    )
)]
pub async fn set_score_visibility(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<SetScoreVisibilityRequest>,
) -> Result<Json<ScoreSummary>, AppError> {
    let summary = score_service::set_visibility(&state, user_id, id, payload.is_public).await?;
    Ok(Json(summary))
}
