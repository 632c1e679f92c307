//! Participant admission and identity: invite-code joins, the opaque
//! per-seat bearer tokens, and the readiness/status/leave operations.

use std::time::SystemTime;

use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, ParticipantStatus, SessionEntity},
    dto::{
        events::{ParticipantPayload, ParticipantStatusPayload, SessionEvent},
        participant::{JoinSessionRequest, JoinSessionResponse},
    },
    error::ServiceError,
    services::{fanout_events, session_service},
    state::{SessionStatus, SharedState},
};

/// Mint a fresh opaque bearer token for a seat. The token's authority lives
/// entirely in the participant row it is stored on.
pub(crate) fn new_participant_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Uppercase an invite code and strip everything that is not alphanumeric,
/// so "abc-234" and "ABC234" look up the same session.
pub fn normalize_invite_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// The caller must hold a seat in the given session. Failing this is an
/// authorization error, not a not-found, so probing ids leaks nothing.
pub(crate) fn ensure_member(
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    if actor.session_id != session_id {
        return Err(ServiceError::Forbidden(
            "not a participant of this session".into(),
        ));
    }
    Ok(())
}

/// The caller must be the session's moderator (resolved through the seat's
/// user linkage, matching the session's `moderator_id`).
pub(crate) fn ensure_moderator(
    session: &SessionEntity,
    actor: &ParticipantEntity,
) -> Result<(), ServiceError> {
    ensure_member(actor, session.id)?;
    if actor.user_id != Some(session.moderator_id) {
        return Err(ServiceError::Forbidden(
            "only the session moderator may do this".into(),
        ));
    }
    Ok(())
}

/// Resolve a bearer token to its participant row.
pub async fn resolve_token(
    state: &SharedState,
    token: &str,
) -> Result<ParticipantEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_participant_by_token(token.to_owned())
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("invalid participant token".into()))
}

/// Take a seat at a session via its invite code. Each join creates a fresh
/// participant row, even for a returning user.
pub async fn join(
    state: &SharedState,
    request: JoinSessionRequest,
    user_id: Option<Uuid>,
) -> Result<JoinSessionResponse, ServiceError> {
    let store = state.require_store().await?;

    let code = normalize_invite_code(&request.invite_code);
    let Some(session) = store.find_session_by_invite(code).await? else {
        return Err(ServiceError::NotFound("unknown invite code".into()));
    };

    match session.status {
        SessionStatus::Draft => {
            return Err(ServiceError::InvalidState(
                "the session lobby is not open yet".into(),
            ));
        }
        SessionStatus::Reveal | SessionStatus::Completed => {
            return Err(ServiceError::InvalidState(
                "the session has already ended".into(),
            ));
        }
        SessionStatus::Waiting | SessionStatus::Active | SessionStatus::Paused => {}
    }

    if let Some(max) = session.max_participants {
        let seated = store.count_participants(session.id).await?;
        if seated >= max as usize {
            return Err(ServiceError::Capacity(format!(
                "session is full ({max} seats)"
            )));
        }
    }

    let participant = ParticipantEntity {
        id: Uuid::new_v4(),
        session_id: session.id,
        user_id,
        display_name: request.display_name,
        status: ParticipantStatus::Waiting,
        is_ready: false,
        current_whiskey_index: 0,
        token: new_participant_token(),
        joined_at: SystemTime::now(),
    };
    store.insert_participant(participant.clone()).await?;

    fanout_events::broadcast_to_session(
        state,
        session.id,
        &SessionEvent::ParticipantJoined(ParticipantPayload {
            participant_id: participant.id,
            display_name: participant.display_name.clone(),
        }),
    );

    let is_moderator = user_id == Some(session.moderator_id);
    let include = session_service::identities_visible(&session, user_id);
    let summary = session_service::summarize(state, &store, &session, include).await?;

    Ok(JoinSessionResponse {
        participant_id: participant.id,
        participant_token: participant.token,
        is_moderator,
        session: summary,
    })
}

/// Flag the caller's seat as ready in the lobby.
pub async fn mark_ready(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_member(actor, session_id)?;
    let store = state.require_store().await?;

    if !store.set_participant_ready(actor.id).await? {
        return Err(ServiceError::NotFound("participant not found".into()));
    }

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::ParticipantReady(ParticipantPayload {
            participant_id: actor.id,
            display_name: actor.display_name.clone(),
        }),
    );
    Ok(())
}

/// Update the caller's own tasting status.
pub async fn update_status(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
    status: ParticipantStatus,
) -> Result<(), ServiceError> {
    ensure_member(actor, session_id)?;
    let store = state.require_store().await?;

    if !store.set_participant_status(actor.id, status).await? {
        return Err(ServiceError::NotFound("participant not found".into()));
    }

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::ParticipantStatus(ParticipantStatusPayload {
            participant_id: actor.id,
            display_name: actor.display_name.clone(),
            status,
        }),
    );
    Ok(())
}

/// Give up the caller's seat. Irreversible: the row and its scores are
/// deleted, and rejoining mints a brand-new identity.
pub async fn leave(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    ensure_member(actor, session_id)?;
    let store = state.require_store().await?;

    if !store.delete_participant(actor.id).await? {
        return Err(ServiceError::NotFound("participant not found".into()));
    }

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::ParticipantLeft(ParticipantPayload {
            participant_id: actor.id,
            display_name: actor.display_name.clone(),
        }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::services::{
        session_service,
        testing::{create_request, test_state, whiskey_input},
    };

    #[test]
    fn invite_codes_are_normalized_before_lookup() {
        assert_eq!(normalize_invite_code("abc-234"), "ABC234");
        assert_eq!(normalize_invite_code("  xy z7 89"), "XYZ789");
        assert_eq!(normalize_invite_code("ABC234"), "ABC234");
    }

    #[tokio::test]
    async fn unknown_invite_code_is_not_found() {
        let state = test_state().await;
        let err = join(
            &state,
            JoinSessionRequest {
                invite_code: "NOPE42".to_string(),
                display_name: "Sam".to_string(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn join_uses_the_normalized_code_and_seats_a_guest() {
        let state = test_state().await;
        let created = session_service::create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();

        let code = created.session.invite_code.to_lowercase();
        let sloppy = format!(" {}-{} ", &code[..3], &code[3..]);
        let joined = join(
            &state,
            JoinSessionRequest {
                invite_code: sloppy,
                display_name: "Guest".to_string(),
            },
            None,
        )
        .await
        .unwrap();

        assert!(!joined.is_moderator);
        assert_eq!(joined.session.id, created.session.id);
        // Guests see no whiskey identities while the tasting is blind.
        assert!(joined.session.whiskeys.iter().all(|w| w.identity.is_none()));
    }

    #[tokio::test]
    async fn draft_lobbies_reject_joins() {
        let state = test_state().await;
        let mut request = create_request(vec![whiskey_input("Dram A")]);
        request.draft = true;
        let created = session_service::create_session(&state, Uuid::new_v4(), request)
            .await
            .unwrap();

        let err = join(
            &state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Early Bird".to_string(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn full_sessions_reject_joins_with_a_capacity_error() {
        let state = test_state().await;
        let mut request = create_request(vec![whiskey_input("Dram A")]);
        request.max_participants = Some(2);
        let created = session_service::create_session(&state, Uuid::new_v4(), request)
            .await
            .unwrap();

        // Seat 2 of 2 (the moderator holds seat 1).
        join(
            &state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Second".to_string(),
            },
            None,
        )
        .await
        .unwrap();

        let err = join(
            &state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Third".to_string(),
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Capacity(_)));
    }

    #[tokio::test]
    async fn leaving_frees_the_seat_and_requires_a_rejoin() {
        let state = test_state().await;
        let created = session_service::create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();

        let joined = join(
            &state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Guest".to_string(),
            },
            None,
        )
        .await
        .unwrap();

        let actor = resolve_token(&state, &joined.participant_token)
            .await
            .unwrap();
        leave(&state, &actor, created.session.id).await.unwrap();

        // The old token no longer resolves.
        let err = resolve_token(&state, &joined.participant_token)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
