use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::extract::{CurrentUser, ParticipantAuth},
    services::{participant_service, sse_service},
    state::{RoomId, SharedState},
};

/// SSE endpoints for the session and user fan-out rooms.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/{id}/events", get(session_stream))
        .route("/users/{id}/events", get(user_stream))
}

/// Stream a session room's events to a seated participant: lifecycle
/// transitions, joins/leaves, readiness, and locked-score notifications.
#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "sse",
    params(("Authorization" = String, Header, description = "Participant bearer token"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses(
        (status = 200, description = "Session event stream", content_type = "text/event-stream", body = String),
        (status = 403, description = "Caller is not a participant of this session")
    )
)]
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    ParticipantAuth(actor): ParticipantAuth,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    participant_service::ensure_member(&actor, id)?;

    let room = RoomId::Session(id);
    let receiver = sse_service::subscribe(&state, room);
    let handshake = sse_service::handshake(&state, &room).await;
    info!(session = %id, participant = %actor.id, "new session SSE subscriber");
    Ok(sse_service::to_sse_stream(room, receiver, handshake))
}

/// Stream a user's direct notifications. Callers may only subscribe to their
/// own room.
#[utoipa::path(
    get,
    path = "/users/{id}/events",
    tag = "sse",
    params(("x-user-id" = String, Header, description = "User id resolved by the auth middleware"),
    ("id" = String, Path, description = "Identifier of the user")),
    responses(
        (status = 200, description = "User event stream", content_type = "text/event-stream", body = String),
        (status = 403, description = "Caller is not this user")
    )
)]
pub async fn user_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    if user_id != id {
        return Err(AppError::Forbidden(
            "cannot subscribe to another user's notifications".into(),
        ));
    }

    let room = RoomId::User(id);
    let receiver = sse_service::subscribe(&state, room);
    let handshake = sse_service::handshake(&state, &room).await;
    info!(user = %id, "new user SSE subscriber");
    Ok(sse_service::to_sse_stream(room, receiver, handshake))
}
