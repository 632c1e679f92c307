//! Orchestration of session lifecycle transitions. This module is the single
//! writer of `status`/`current_phase`/`current_whiskey_index`: every
//! transition takes the session's gate, recomputes from the stored row, and
//! persists through the conditional update before anything is broadcast.

use std::time::SystemTime;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, SessionEntity},
    dto::{
        events::{PhasePayload, SessionEvent, StatusPayload},
        score::SessionResults,
        session::{AdvanceRequest, SessionSummary},
    },
    error::ServiceError,
    services::{
        fanout_events, participant_service::ensure_moderator, score_service, session_service,
    },
    state::{Lifecycle, LifecycleEvent, SharedState, TastingPhase},
};

/// Open a draft session's lobby so participants can join.
pub async fn open(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::Open).await?;
    summarize_after(state, session, next).await
}

/// Start the tasting: phase clock begins at pour on whiskey 0.
pub async fn start(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::Start).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Started(phase_payload(state, &next)),
    );
    summarize_after(state, session, next).await
}

/// Move the phase clock forward, or jump to a named phase/whiskey.
pub async fn advance(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
    request: AdvanceRequest,
) -> Result<SessionSummary, ServiceError> {
    let event = LifecycleEvent::Advance {
        phase: request.phase,
        whiskey_index: request.whiskey_index,
    };
    let (_guard, session, next) = run_transition(state, actor, session_id, event).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Advanced(phase_payload(state, &next)),
    );
    summarize_after(state, session, next).await
}

/// Pause the tasting. Phase and whiskey index stay put.
pub async fn pause(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::Pause).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Paused(StatusPayload {
            status: next.status,
        }),
    );
    summarize_after(state, session, next).await
}

/// Resume a paused tasting.
pub async fn resume(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::Resume).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Resumed(StatusPayload {
            status: next.status,
        }),
    );
    summarize_after(state, session, next).await
}

/// Expose whiskey identities and everyone's scores. Irreversible.
pub async fn reveal(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionResults, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::Reveal).await?;

    let store = state.require_store().await?;
    let revealed = session.with_lifecycle(next);
    let results = score_service::assemble_results(&store, &revealed).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Reveal(results.clone()),
    );

    Ok(results)
}

/// Finalize the session. Terminal: nothing transitions out of completed.
pub async fn end(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionSummary, ServiceError> {
    let (_guard, session, next) =
        run_transition(state, actor, session_id, LifecycleEvent::End).await?;

    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::Ended(StatusPayload {
            status: next.status,
        }),
    );
    summarize_after(state, session, next).await
}

/// Shared transition skeleton: take the session's gate, load the row,
/// authorize the moderator, compute the pure transition, and persist it
/// through the conditional update. The returned guard keeps the gate held
/// until the caller has broadcast, so broadcast order matches persisted
/// order under concurrent calls.
async fn run_transition(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
    event: LifecycleEvent,
) -> Result<(OwnedMutexGuard<()>, SessionEntity, Lifecycle), ServiceError> {
    let store = state.require_store().await?;
    let guard = state.session_gate(session_id).lock_owned().await;

    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };
    ensure_moderator(&session, actor)?;

    let whiskey_count = store.list_whiskeys(session_id).await?.len();
    let current = session.lifecycle();
    let next = current.apply(&event, whiskey_count)?;

    let updated = store
        .update_session_lifecycle(session_id, current, next, SystemTime::now())
        .await?;
    if !updated {
        // The gate makes this unreachable in-process; the conditional update
        // catches writers outside it (another replica, a manual edit).
        return Err(ServiceError::InvalidState(
            "session state changed concurrently; reload and retry".into(),
        ));
    }

    Ok((guard, session, next))
}

fn phase_payload(state: &SharedState, next: &Lifecycle) -> PhasePayload {
    let phase = next.phase.unwrap_or(TastingPhase::Pour);
    PhasePayload {
        phase,
        whiskey_index: next.whiskey_index,
        duration_hint_secs: state.config().timer_hint_secs(phase),
    }
}

async fn summarize_after(
    state: &SharedState,
    session: SessionEntity,
    next: Lifecycle,
) -> Result<SessionSummary, ServiceError> {
    let store = state.require_store().await?;
    let updated = session.with_lifecycle(next);
    // The caller is the moderator, so identities are included.
    session_service::summarize(state, &store, &updated, true).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        dto::participant::JoinSessionRequest,
        services::{
            participant_service,
            testing::{create_request, test_state, whiskey_input},
        },
        state::{SessionStatus, TastingPhase},
    };

    async fn seeded_session(
        state: &SharedState,
        whiskeys: usize,
    ) -> (Uuid, ParticipantEntity, String) {
        let moderator_user = Uuid::new_v4();
        let inputs = (0..whiskeys)
            .map(|i| whiskey_input(&format!("Dram {i}")))
            .collect();
        let created =
            crate::services::session_service::create_session(state, moderator_user, create_request(inputs))
                .await
                .unwrap();
        let moderator = participant_service::resolve_token(state, &created.participant_token)
            .await
            .unwrap();
        (created.session.id, moderator, created.session.invite_code)
    }

    #[tokio::test]
    async fn start_sets_pour_and_index_zero() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 2).await;

        let summary = start(&state, &moderator, session_id).await.unwrap();
        assert_eq!(summary.status, SessionStatus::Active);
        assert_eq!(summary.current_phase, Some(TastingPhase::Pour));
        assert_eq!(summary.current_whiskey_index, 0);
        assert!(summary.phase_timer_hint_secs.is_some());
    }

    #[tokio::test]
    async fn non_moderators_cannot_drive_the_lifecycle() {
        let state = test_state().await;
        let (session_id, _moderator, invite) = seeded_session(&state, 1).await;

        let joined = participant_service::join(
            &state,
            JoinSessionRequest {
                invite_code: invite,
                display_name: "Guest".to_string(),
            },
            None,
        )
        .await
        .unwrap();
        let guest = participant_service::resolve_token(&state, &joined.participant_token)
            .await
            .unwrap();

        let err = start(&state, &guest, session_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // State is unchanged: the moderator can still start normally.
        let guest_err = advance(&state, &guest, session_id, AdvanceRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(guest_err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn advance_walks_the_cycle_and_rolls_to_the_next_whiskey() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 2).await;
        start(&state, &moderator, session_id).await.unwrap();

        let mut phases = vec![TastingPhase::Pour];
        for _ in 0..5 {
            let summary = advance(&state, &moderator, session_id, AdvanceRequest::default())
                .await
                .unwrap();
            assert_eq!(summary.current_whiskey_index, 0);
            phases.push(summary.current_phase.unwrap());
        }
        assert_eq!(phases, TastingPhase::CYCLE.to_vec());

        let summary = advance(&state, &moderator, session_id, AdvanceRequest::default())
            .await
            .unwrap();
        assert_eq!(summary.current_phase, Some(TastingPhase::Pour));
        assert_eq!(summary.current_whiskey_index, 1);
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 1).await;
        start(&state, &moderator, session_id).await.unwrap();

        let paused = pause(&state, &moderator, session_id).await.unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.current_phase, Some(TastingPhase::Pour));

        let resumed = resume(&state, &moderator, session_id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn completed_sessions_reject_every_transition() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 1).await;
        start(&state, &moderator, session_id).await.unwrap();
        end(&state, &moderator, session_id).await.unwrap();

        for result in [
            start(&state, &moderator, session_id).await.err(),
            pause(&state, &moderator, session_id).await.err(),
            resume(&state, &moderator, session_id).await.err(),
            end(&state, &moderator, session_id).await.err(),
        ] {
            assert!(matches!(result, Some(ServiceError::InvalidState(_))));
        }
        assert!(matches!(
            reveal(&state, &moderator, session_id).await.unwrap_err(),
            ServiceError::InvalidState(_)
        ));
    }

    #[tokio::test]
    async fn fetching_twice_without_writes_is_stable() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 2).await;
        start(&state, &moderator, session_id).await.unwrap();

        let first = crate::services::session_service::get_session(&state, session_id, Some(&moderator))
            .await
            .unwrap();
        let second = crate::services::session_service::get_session(&state, session_id, Some(&moderator))
            .await
            .unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.current_phase, second.current_phase);
        assert_eq!(first.current_whiskey_index, second.current_whiskey_index);
    }

    #[tokio::test]
    async fn concurrent_advances_serialize_cleanly() {
        let state = test_state().await;
        let (session_id, moderator, _) = seeded_session(&state, 2).await;
        start(&state, &moderator, session_id).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let state = state.clone();
            let moderator = moderator.clone();
            handles.push(tokio::spawn(async move {
                advance(&state, &moderator, session_id, AdvanceRequest::default()).await
            }));
        }

        for handle in handles {
            // Every call either advances or reports a clean conflict; none
            // may corrupt the row.
            let _ = handle.await.unwrap();
        }

        let summary = crate::services::session_service::get_session(&state, session_id, Some(&moderator))
            .await
            .unwrap();
        // Five bare advances from pour land on palate_reset of whiskey 0.
        assert_eq!(summary.current_phase, Some(TastingPhase::PalateReset));
        assert_eq!(summary.current_whiskey_index, 0);
    }
}
