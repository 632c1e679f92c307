//! Session bootstrap and read-model assembly: creation with a fresh invite
//! code, blind-filtered summaries, and pre-start flight edits.

use std::{sync::Arc, time::SystemTime};

use rand::Rng;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ParticipantEntity, ParticipantStatus, SessionEntity, SessionTheme, WhiskeyEntity},
        session_store::SessionStore,
        storage::{StorageError, UniqueConstraint},
    },
    dto::{
        parse_rfc3339,
        participant::ParticipantSummary,
        session::{CreateSessionRequest, CreateSessionResponse, SessionSummary, WhiskeyInput, WhiskeySummary},
    },
    error::ServiceError,
    services::participant_service::{ensure_moderator, new_participant_token},
    state::{SessionStatus, SharedState, lifecycle::Lifecycle},
};

/// Alphabet used for invite codes. Ambiguous characters (`0/O`, `1/I/L`) are
/// excluded so codes survive being read out loud across a table.
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const INVITE_CODE_LENGTH: usize = 6;
const INVITE_CODE_ATTEMPTS: usize = 5;

/// Default pour when the moderator does not specify one, in milliliters.
const DEFAULT_POUR_ML: f32 = 30.0;

fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    (0..INVITE_CODE_LENGTH)
        .map(|_| INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Create a session with its flight, seat the moderator, and hand back the
/// invite code plus the moderator's participant token.
pub async fn create_session(
    state: &SharedState,
    moderator_id: Uuid,
    request: CreateSessionRequest,
) -> Result<CreateSessionResponse, ServiceError> {
    let store = state.require_store().await?;

    let scheduled_for = request
        .scheduled_for
        .as_deref()
        .map(parse_rfc3339)
        .transpose()
        .map_err(|err| {
            ServiceError::InvalidInput(format!(
                "scheduled_for is not a valid RFC 3339 timestamp: {err}"
            ))
        })?;

    let custom_theme = request
        .custom_theme
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_owned);
    if request.theme == SessionTheme::Custom && custom_theme.is_none() {
        return Err(ServiceError::InvalidInput(
            "a custom theme requires a custom_theme label".into(),
        ));
    }

    let now = SystemTime::now();
    let status = if request.draft {
        SessionStatus::Draft
    } else {
        SessionStatus::Waiting
    };

    let mut session = SessionEntity {
        id: Uuid::new_v4(),
        invite_code: generate_invite_code(),
        name: request.name,
        theme: request.theme,
        custom_theme,
        proof_range: request.proof_range.map(Into::into),
        scheduled_for,
        status,
        current_phase: None,
        current_whiskey_index: 0,
        moderator_id,
        max_participants: request.max_participants,
        created_at: now,
        updated_at: now,
    };

    let mut attempts = 0;
    loop {
        match store.insert_session(session.clone()).await {
            Ok(()) => break,
            Err(StorageError::Duplicate {
                constraint: UniqueConstraint::InviteCode,
            }) if attempts < INVITE_CODE_ATTEMPTS => {
                attempts += 1;
                session.invite_code = generate_invite_code();
            }
            Err(other) => return Err(other.into()),
        }
    }

    for (index, input) in request.whiskeys.into_iter().enumerate() {
        store
            .insert_whiskey(build_whiskey(session.id, index as u32 + 1, input))
            .await?;
    }

    // The moderator tastes and scores too, so they get a seat like anyone
    // else; their token comes back in the create response.
    let moderator_seat = ParticipantEntity {
        id: Uuid::new_v4(),
        session_id: session.id,
        user_id: Some(moderator_id),
        display_name: request.moderator_name,
        status: ParticipantStatus::Waiting,
        is_ready: false,
        current_whiskey_index: 0,
        token: new_participant_token(),
        joined_at: now,
    };
    store.insert_participant(moderator_seat.clone()).await?;

    let summary = summarize(state, &store, &session, true).await?;
    Ok(CreateSessionResponse {
        session: summary,
        participant_id: moderator_seat.id,
        participant_token: moderator_seat.token,
    })
}

/// Fetch a session summary. The whiskey identity blind is applied according
/// to the viewer: moderators always see identities, everyone else only once
/// the session reaches reveal.
pub async fn get_session(
    state: &SharedState,
    session_id: Uuid,
    viewer: Option<&ParticipantEntity>,
) -> Result<SessionSummary, ServiceError> {
    let store = state.require_store().await?;
    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };

    let viewer_user = viewer.and_then(|p| p.user_id);
    let include = identities_visible(&session, viewer_user);
    summarize(state, &store, &session, include).await
}

/// Append a whiskey to the flight. Moderator-only, and only before start;
/// the flight is immutable once the tasting is underway.
pub async fn add_whiskey(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
    input: WhiskeyInput,
) -> Result<WhiskeySummary, ServiceError> {
    let store = state.require_store().await?;
    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };
    ensure_moderator(&session, actor)?;

    if !matches!(
        session.status,
        SessionStatus::Draft | SessionStatus::Waiting
    ) {
        return Err(ServiceError::InvalidState(
            "the flight is locked once the tasting starts".into(),
        ));
    }

    let display_number = store.list_whiskeys(session_id).await?.len() as u32 + 1;
    let whiskey = build_whiskey(session_id, display_number, input);
    store.insert_whiskey(whiskey.clone()).await?;

    Ok(WhiskeySummary::from_entity(&whiskey, true))
}

/// Delete a staged session. Only drafts can be deleted; an opened lobby has
/// participants who would lose their seats silently.
pub async fn delete_session(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };
    ensure_moderator(&session, actor)?;

    if session.status != SessionStatus::Draft {
        return Err(ServiceError::InvalidState(
            "only draft sessions can be deleted".into(),
        ));
    }

    if store.delete_session(session_id).await? {
        Ok(())
    } else {
        Err(ServiceError::NotFound("session not found".into()))
    }
}

/// Whether the viewer may see true whiskey identities for this session.
pub(crate) fn identities_visible(session: &SessionEntity, viewer_user: Option<Uuid>) -> bool {
    viewer_user == Some(session.moderator_id)
        || matches!(
            session.status,
            SessionStatus::Reveal | SessionStatus::Completed
        )
}

/// Assemble the full read model of a session.
pub(crate) async fn summarize(
    state: &SharedState,
    store: &Arc<dyn SessionStore>,
    session: &SessionEntity,
    include_identities: bool,
) -> Result<SessionSummary, ServiceError> {
    let whiskeys = store.list_whiskeys(session.id).await?;
    let participants = store
        .list_participants(session.id)
        .await?
        .iter()
        .map(|p| ParticipantSummary::from_entity(p, session.moderator_id))
        .collect();

    let hint = phase_timer_hint(state, &session.lifecycle());
    Ok(SessionSummary::assemble(
        session,
        &whiskeys,
        participants,
        include_identities,
        hint,
    ))
}

/// Advisory countdown for the session's current phase, when it has one.
pub(crate) fn phase_timer_hint(state: &SharedState, lifecycle: &Lifecycle) -> Option<u64> {
    lifecycle
        .phase
        .map(|phase| state.config().timer_hint_secs(phase))
}

fn build_whiskey(session_id: Uuid, display_number: u32, input: WhiskeyInput) -> WhiskeyEntity {
    WhiskeyEntity {
        id: Uuid::new_v4(),
        session_id,
        display_number,
        name: input.name,
        distillery: input.distillery,
        age_years: input.age_years,
        proof: input.proof,
        price: input.price,
        mashbill: input.mashbill,
        region: input.region,
        pour_size_ml: input.pour_size_ml.unwrap_or(DEFAULT_POUR_ML),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::services::{
        lifecycle_service, participant_service,
        testing::{create_request, test_state, whiskey_input},
    };

    #[test]
    fn invite_codes_use_the_unambiguous_alphabet() {
        for _ in 0..100 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LENGTH);
            assert!(
                code.bytes().all(|b| INVITE_ALPHABET.contains(&b)),
                "unexpected character in `{code}`"
            );
            for ambiguous in ['0', 'O', '1', 'I', 'L'] {
                assert!(!code.contains(ambiguous));
            }
        }
    }

    #[tokio::test]
    async fn whiskeys_can_be_added_only_before_start() {
        let state = test_state().await;
        let created = create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();
        let moderator = participant_service::resolve_token(&state, &created.participant_token)
            .await
            .unwrap();

        let added = add_whiskey(
            &state,
            &moderator,
            created.session.id,
            whiskey_input("Dram B"),
        )
        .await
        .unwrap();
        assert_eq!(added.display_number, 2);

        lifecycle_service::start(&state, &moderator, created.session.id)
            .await
            .unwrap();
        let err = add_whiskey(
            &state,
            &moderator,
            created.session.id,
            whiskey_input("Dram C"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn only_draft_sessions_can_be_deleted() {
        let state = test_state().await;

        let open = create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();
        let open_moderator = participant_service::resolve_token(&state, &open.participant_token)
            .await
            .unwrap();
        let err = delete_session(&state, &open_moderator, open.session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let mut request = create_request(vec![whiskey_input("Dram A")]);
        request.draft = true;
        let draft = create_session(&state, Uuid::new_v4(), request)
            .await
            .unwrap();
        let draft_moderator = participant_service::resolve_token(&state, &draft.participant_token)
            .await
            .unwrap();
        delete_session(&state, &draft_moderator, draft.session.id)
            .await
            .unwrap();

        let err = get_session(&state, draft.session.id, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn the_blind_filter_lifts_at_reveal() {
        let state = test_state().await;
        let created = create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();
        let moderator = participant_service::resolve_token(&state, &created.participant_token)
            .await
            .unwrap();

        // Anonymous viewers see no identities while the tasting is blind.
        let before = get_session(&state, created.session.id, None).await.unwrap();
        assert!(before.whiskeys.iter().all(|w| w.identity.is_none()));

        lifecycle_service::start(&state, &moderator, created.session.id)
            .await
            .unwrap();
        lifecycle_service::reveal(&state, &moderator, created.session.id)
            .await
            .unwrap();

        let after = get_session(&state, created.session.id, None).await.unwrap();
        assert!(after.whiskeys.iter().all(|w| w.identity.is_some()));
    }
}
