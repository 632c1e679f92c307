//! Score locking and aggregation: the one-score-per-participant-per-whiskey
//! invariant, the weighted total, and the reveal-gated results projection.
//!
//! The duplicate pre-check here only shapes a friendly error; the storage
//! layer's unique (participant, whiskey) constraint is the authoritative
//! guard, and its violation maps to the same conflict message.

use std::{sync::Arc, time::SystemTime};

use indexmap::IndexMap;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::{
        models::{ParticipantEntity, ParticipantStatus, ScoreEntity, SessionEntity},
        session_store::SessionStore,
    },
    dto::{
        events::{ScoreLockedPayload, SessionEvent},
        format_system_time,
        score::{
            ScoreAverages, ScoreReceipt, ScoreSummary, SessionResults, SubmitScoreRequest,
            WhiskeyResults,
        },
        session::WhiskeySummary,
    },
    error::ServiceError,
    services::{fanout_events, participant_service::ensure_member},
    state::{SessionStatus, SharedState},
};

/// Subscore weights: nose, palate, finish, overall.
const WEIGHT_NOSE: f64 = 0.25;
const WEIGHT_PALATE: f64 = 0.35;
const WEIGHT_FINISH: f64 = 0.25;
const WEIGHT_OVERALL: f64 = 0.15;

/// Round to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Weighted total of the four subscores, rounded to one decimal.
pub(crate) fn weighted_total(nose: u8, palate: u8, finish: u8, overall: u8) -> f64 {
    round1(
        f64::from(nose) * WEIGHT_NOSE
            + f64::from(palate) * WEIGHT_PALATE
            + f64::from(finish) * WEIGHT_FINISH
            + f64::from(overall) * WEIGHT_OVERALL,
    )
}

/// Lock a score for one whiskey. Preconditions are checked in order, each a
/// distinct failure: subscore ranges, note lengths, session membership, the
/// whiskey belonging to the session, no prior score for the pair, and the
/// session being active. Once locked the score is immutable.
pub async fn submit(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
    request: SubmitScoreRequest,
) -> Result<ScoreReceipt, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    ensure_member(actor, session_id)?;

    let store = state.require_store().await?;
    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };

    let whiskeys = store.list_whiskeys(session_id).await?;
    let Some(position) = whiskeys.iter().position(|w| w.id == request.whiskey_id) else {
        return Err(ServiceError::NotFound(
            "whiskey does not belong to this session".into(),
        ));
    };

    if store
        .find_score_for_pair(actor.id, request.whiskey_id)
        .await?
        .is_some()
    {
        return Err(ServiceError::Duplicate(
            "Score already submitted for this whiskey".into(),
        ));
    }

    if session.status != SessionStatus::Active {
        return Err(ServiceError::InvalidState("Session is not active".into()));
    }

    let total_score = weighted_total(request.nose, request.palate, request.finish, request.overall);
    let score = ScoreEntity {
        id: Uuid::new_v4(),
        session_id,
        whiskey_id: request.whiskey_id,
        participant_id: actor.id,
        nose: request.nose,
        palate: request.palate,
        finish: request.finish,
        overall: request.overall,
        total_score,
        nose_notes: request.nose_notes,
        palate_notes: request.palate_notes,
        finish_notes: request.finish_notes,
        overall_notes: request.overall_notes,
        identity_guess: request.identity_guess,
        is_public: false,
        locked_at: SystemTime::now(),
    };
    // A concurrent submission that slipped past the pre-check is rejected
    // here by the unique constraint and surfaces as the same conflict.
    store.insert_score(score.clone()).await?;

    let next_index = actor.current_whiskey_index.max(position + 1);
    let status = if next_index >= whiskeys.len() {
        ParticipantStatus::Completed
    } else {
        ParticipantStatus::Tasting
    };
    store
        .record_participant_progress(actor.id, next_index, status)
        .await?;

    // The payload names the scorer but carries no score values, so the rest
    // of the table stays blind.
    fanout_events::broadcast_to_session(
        state,
        session_id,
        &SessionEvent::ScoreLocked(ScoreLockedPayload {
            participant_id: actor.id,
            whiskey_id: score.whiskey_id,
            participant_name: actor.display_name.clone(),
        }),
    );

    Ok(ScoreReceipt {
        score_id: score.id,
        total_score,
        locked_at: format_system_time(score.locked_at),
    })
}

/// Full results of a session. Members only, and only once the session has
/// reached reveal, so aggregate standings cannot bias still-tasting
/// participants.
pub async fn get_results(
    state: &SharedState,
    actor: &ParticipantEntity,
    session_id: Uuid,
) -> Result<SessionResults, ServiceError> {
    ensure_member(actor, session_id)?;

    let store = state.require_store().await?;
    let Some(session) = store.find_session(session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };

    if !matches!(
        session.status,
        SessionStatus::Reveal | SessionStatus::Completed
    ) {
        return Err(ServiceError::Forbidden(
            "results are hidden until the reveal".into(),
        ));
    }

    assemble_results(&store, &session).await
}

/// Toggle whether a locked score is shared publicly. Only the owning user
/// may do this, and only once the session has reached reveal.
pub async fn set_visibility(
    state: &SharedState,
    user_id: Uuid,
    score_id: Uuid,
    is_public: bool,
) -> Result<ScoreSummary, ServiceError> {
    let store = state.require_store().await?;
    let Some(mut score) = store.find_score(score_id).await? else {
        return Err(ServiceError::NotFound("score not found".into()));
    };

    let Some(owner) = store.find_participant(score.participant_id).await? else {
        return Err(ServiceError::Forbidden(
            "the scoring seat no longer exists".into(),
        ));
    };
    // Ownership is resolved through the seat's user linkage, not the raw
    // participant id; anonymous guests have no account to toggle from.
    if owner.user_id != Some(user_id) {
        return Err(ServiceError::Forbidden(
            "only the score owner may change its visibility".into(),
        ));
    }

    let Some(session) = store.find_session(score.session_id).await? else {
        return Err(ServiceError::NotFound("session not found".into()));
    };
    if !matches!(
        session.status,
        SessionStatus::Reveal | SessionStatus::Completed
    ) {
        return Err(ServiceError::InvalidState(
            "scores can be shared only after the reveal".into(),
        ));
    }

    if !store.set_score_visibility(score_id, is_public).await? {
        return Err(ServiceError::NotFound("score not found".into()));
    }

    score.is_public = is_public;
    Ok(ScoreSummary::from_entity(&score, owner.display_name))
}

/// Assemble the revealed results: per whiskey, the unmasked identity, the
/// one-decimal mean of every subscore and of the total, each individual
/// score with the scorer's name, and a dense rank by descending mean total
/// (ties share a rank and keep flight order).
pub(crate) async fn assemble_results(
    store: &Arc<dyn SessionStore>,
    session: &SessionEntity,
) -> Result<SessionResults, ServiceError> {
    let whiskeys = store.list_whiskeys(session.id).await?;
    let scores = store.list_scores(session.id).await?;
    let participants = store.list_participants(session.id).await?;

    let names: IndexMap<Uuid, String> = participants
        .iter()
        .map(|p| (p.id, p.display_name.clone()))
        .collect();

    // Group scores per whiskey, keyed in flight order so tied ranks keep a
    // stable presentation.
    let mut by_whiskey: IndexMap<Uuid, Vec<ScoreSummary>> =
        whiskeys.iter().map(|w| (w.id, Vec::new())).collect();
    for score in &scores {
        if let Some(bucket) = by_whiskey.get_mut(&score.whiskey_id) {
            let name = names
                .get(&score.participant_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            bucket.push(ScoreSummary::from_entity(score, name));
        }
    }

    let mut results: Vec<(Option<f64>, WhiskeyResults)> = whiskeys
        .iter()
        .map(|whiskey| {
            let scores = by_whiskey.shift_remove(&whiskey.id).unwrap_or_default();
            let averages = average_scores(&scores);
            let mean_total = averages.map(|a| a.total);
            (
                mean_total,
                WhiskeyResults {
                    whiskey: WhiskeySummary::from_entity(whiskey, true),
                    rank: 0,
                    averages,
                    scores,
                },
            )
        })
        .collect();

    // Descending mean total; unscored whiskeys sort last. The sort is stable,
    // so ties stay in flight order.
    results.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut rank = 0;
    let mut previous: Option<Option<f64>> = None;
    let whiskeys = results
        .into_iter()
        .map(|(mean, mut entry)| {
            if previous != Some(mean) {
                rank += 1;
                previous = Some(mean);
            }
            entry.rank = rank;
            entry
        })
        .collect();

    Ok(SessionResults {
        session_id: session.id,
        status: session.status,
        whiskeys,
    })
}

fn average_scores(scores: &[ScoreSummary]) -> Option<ScoreAverages> {
    if scores.is_empty() {
        return None;
    }

    let count = scores.len() as f64;
    let mean = |pick: fn(&ScoreSummary) -> f64| round1(scores.iter().map(pick).sum::<f64>() / count);

    Some(ScoreAverages {
        nose: mean(|s| f64::from(s.nose)),
        palate: mean(|s| f64::from(s.palate)),
        finish: mean(|s| f64::from(s.finish)),
        overall: mean(|s| f64::from(s.overall)),
        total: mean(|s| s.total_score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        dto::{
            participant::JoinSessionRequest,
            session::{AdvanceRequest, SessionSummary},
        },
        services::{
            lifecycle_service, participant_service, session_service,
            testing::{create_request, test_state, whiskey_input},
        },
    };

    fn score_request(whiskey_id: Uuid, subs: [u8; 4]) -> SubmitScoreRequest {
        SubmitScoreRequest {
            whiskey_id,
            nose: subs[0],
            palate: subs[1],
            finish: subs[2],
            overall: subs[3],
            nose_notes: None,
            palate_notes: None,
            finish_notes: None,
            overall_notes: None,
            identity_guess: None,
        }
    }

    struct Table {
        session: SessionSummary,
        moderator: ParticipantEntity,
        guest: ParticipantEntity,
    }

    /// Create a session, seat one guest, and start the tasting.
    async fn started_table(state: &SharedState, whiskeys: usize) -> Table {
        let inputs = (0..whiskeys)
            .map(|i| whiskey_input(&format!("Dram {i}")))
            .collect();
        let created = session_service::create_session(state, Uuid::new_v4(), create_request(inputs))
            .await
            .unwrap();
        let moderator = participant_service::resolve_token(state, &created.participant_token)
            .await
            .unwrap();

        let joined = participant_service::join(
            state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Islay Pete".to_string(),
            },
            None,
        )
        .await
        .unwrap();
        let guest = participant_service::resolve_token(state, &joined.participant_token)
            .await
            .unwrap();

        let session = lifecycle_service::start(state, &moderator, created.session.id)
            .await
            .unwrap();
        Table {
            session,
            moderator,
            guest,
        }
    }

    #[test]
    fn weighted_total_matches_the_published_formula() {
        assert_eq!(weighted_total(8, 6, 7, 9), 7.2);
        assert_eq!(weighted_total(5, 5, 5, 5), 5.0);
        assert_eq!(weighted_total(10, 10, 10, 10), 10.0);
        assert_eq!(weighted_total(1, 1, 1, 1), 1.0);
    }

    #[tokio::test]
    async fn out_of_range_subscores_are_rejected_by_field() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;
        let whiskey = table.session.whiskeys[0].id;

        let err = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(whiskey, [11, 5, 5, 5]),
        )
        .await
        .unwrap_err();
        match err {
            ServiceError::InvalidInput(message) => assert!(message.contains("nose")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_members_cannot_submit() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;
        let whiskey = table.session.whiskeys[0].id;

        let mut outsider = table.guest.clone();
        outsider.session_id = Uuid::new_v4();
        let err = submit(
            &state,
            &outsider,
            table.session.id,
            score_request(whiskey, [5, 5, 5, 5]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn foreign_whiskeys_are_not_found() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;

        let err = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(Uuid::new_v4(), [5, 5, 5, 5]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn scores_lock_only_while_the_session_is_active() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;
        let whiskey = table.session.whiskeys[0].id;

        lifecycle_service::pause(&state, &table.moderator, table.session.id)
            .await
            .unwrap();
        let err = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(whiskey, [5, 5, 5, 5]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn duplicate_submissions_are_conflicts() {
        let state = test_state().await;
        let table = started_table(&state, 2).await;
        let whiskey = table.session.whiskeys[0].id;

        submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(whiskey, [5, 5, 5, 5]),
        )
        .await
        .unwrap();

        let err = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(whiskey, [6, 6, 6, 6]),
        )
        .await
        .unwrap_err();
        match err {
            ServiceError::Duplicate(message) => {
                assert_eq!(message, "Score already submitted for this whiskey");
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_submissions_yield_exactly_one_success() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;
        let whiskey = table.session.whiskeys[0].id;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let state = state.clone();
            let guest = table.guest.clone();
            let session_id = table.session.id;
            handles.push(tokio::spawn(async move {
                submit(
                    &state,
                    &guest,
                    session_id,
                    score_request(whiskey, [5, 5, 5, 5]),
                )
                .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::Duplicate(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn locking_the_last_score_completes_the_participant() {
        let state = test_state().await;
        let table = started_table(&state, 2).await;

        submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(table.session.whiskeys[0].id, [5, 5, 5, 5]),
        )
        .await
        .unwrap();
        let store = state.store().await.unwrap();
        let after_first = store.find_participant(table.guest.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, ParticipantStatus::Tasting);
        assert_eq!(after_first.current_whiskey_index, 1);

        submit(
            &state,
            &after_first,
            table.session.id,
            score_request(table.session.whiskeys[1].id, [6, 6, 6, 6]),
        )
        .await
        .unwrap();
        let done = store.find_participant(table.guest.id).await.unwrap().unwrap();
        assert_eq!(done.status, ParticipantStatus::Completed);
        assert_eq!(done.current_whiskey_index, 2);
    }

    #[tokio::test]
    async fn results_are_forbidden_before_the_reveal() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;

        let err = get_results(&state, &table.guest, table.session.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn revealed_results_rank_whiskeys_by_mean_total() {
        let state = test_state().await;
        let table = started_table(&state, 3).await;
        let [first, second, third] = [
            table.session.whiskeys[0].id,
            table.session.whiskeys[1].id,
            table.session.whiskeys[2].id,
        ];

        // Guest: 5.0 / 7.2 / 5.0. Moderator: 5.0 on the first whiskey only,
        // leaving a tie between whiskeys 1 and 3.
        for (whiskey, subs) in [
            (first, [5, 5, 5, 5]),
            (second, [8, 6, 7, 9]),
            (third, [5, 5, 5, 5]),
        ] {
            submit(
                &state,
                &table.guest,
                table.session.id,
                score_request(whiskey, subs),
            )
            .await
            .unwrap();
        }
        submit(
            &state,
            &table.moderator,
            table.session.id,
            score_request(first, [5, 5, 5, 5]),
        )
        .await
        .unwrap();

        lifecycle_service::reveal(&state, &table.moderator, table.session.id)
            .await
            .unwrap();

        let results = get_results(&state, &table.guest, table.session.id)
            .await
            .unwrap();
        assert_eq!(results.whiskeys.len(), 3);

        let ranked: Vec<(u32, u32, Option<f64>)> = results
            .whiskeys
            .iter()
            .map(|w| (w.rank, w.whiskey.display_number, w.averages.map(|a| a.total)))
            .collect();
        // 7.2 wins; the two 5.0 whiskeys share a dense rank in flight order.
        assert_eq!(
            ranked,
            vec![(1, 2, Some(7.2)), (2, 1, Some(5.0)), (2, 3, Some(5.0))]
        );

        // Identities are unmasked and every score carries the scorer's name.
        assert!(results.whiskeys.iter().all(|w| w.whiskey.identity.is_some()));
        let winner = &results.whiskeys[1];
        assert_eq!(winner.scores.len(), 2);
        assert!(
            winner
                .scores
                .iter()
                .any(|s| s.participant_name == "Islay Pete")
        );
    }

    #[tokio::test]
    async fn unscored_whiskeys_rank_last_without_averages() {
        let state = test_state().await;
        let table = started_table(&state, 2).await;

        submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(table.session.whiskeys[1].id, [8, 6, 7, 9]),
        )
        .await
        .unwrap();
        lifecycle_service::reveal(&state, &table.moderator, table.session.id)
            .await
            .unwrap();

        let results = get_results(&state, &table.guest, table.session.id)
            .await
            .unwrap();
        assert_eq!(results.whiskeys[0].rank, 1);
        assert!(results.whiskeys[0].averages.is_some());
        assert_eq!(results.whiskeys[1].rank, 2);
        assert!(results.whiskeys[1].averages.is_none());
        assert!(results.whiskeys[1].scores.is_empty());
    }

    #[tokio::test]
    async fn visibility_toggles_are_owner_only_and_reveal_gated() {
        let state = test_state().await;
        let owner_user = Uuid::new_v4();

        let created = session_service::create_session(
            &state,
            Uuid::new_v4(),
            create_request(vec![whiskey_input("Dram A")]),
        )
        .await
        .unwrap();
        let moderator = participant_service::resolve_token(&state, &created.participant_token)
            .await
            .unwrap();

        let joined = participant_service::join(
            &state,
            JoinSessionRequest {
                invite_code: created.session.invite_code.clone(),
                display_name: "Account Holder".to_string(),
            },
            Some(owner_user),
        )
        .await
        .unwrap();
        let guest = participant_service::resolve_token(&state, &joined.participant_token)
            .await
            .unwrap();

        lifecycle_service::start(&state, &moderator, created.session.id)
            .await
            .unwrap();
        let receipt = submit(
            &state,
            &guest,
            created.session.id,
            score_request(created.session.whiskeys[0].id, [5, 5, 5, 5]),
        )
        .await
        .unwrap();

        // Not meaningful until the reveal.
        let err = set_visibility(&state, owner_user, receipt.score_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        lifecycle_service::reveal(&state, &moderator, created.session.id)
            .await
            .unwrap();

        let err = set_visibility(&state, Uuid::new_v4(), receipt.score_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let summary = set_visibility(&state, owner_user, receipt.score_id, true)
            .await
            .unwrap();
        assert!(summary.is_public);
        assert_eq!(summary.participant_name, "Account Holder");
    }

    #[tokio::test]
    async fn anonymous_scores_cannot_be_made_public() {
        let state = test_state().await;
        let table = started_table(&state, 1).await;

        let receipt = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(table.session.whiskeys[0].id, [5, 5, 5, 5]),
        )
        .await
        .unwrap();
        lifecycle_service::reveal(&state, &table.moderator, table.session.id)
            .await
            .unwrap();

        let err = set_visibility(&state, Uuid::new_v4(), receipt.score_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    /// Full happy path: create, join, start, score, duplicate rejection,
    /// advance through both whiskeys, reveal, and read the standings.
    #[tokio::test]
    async fn end_to_end_blind_flight() {
        let state = test_state().await;
        let table = started_table(&state, 2).await;
        let first = table.session.whiskeys[0].id;
        let second = table.session.whiskeys[1].id;

        let receipt = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(first, [5, 5, 5, 5]),
        )
        .await
        .unwrap();
        assert_eq!(receipt.total_score, 5.0);

        let err = submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(first, [5, 5, 5, 5]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));

        // Walk whiskey #1's remaining phases and into whiskey #2.
        for _ in 0..6 {
            lifecycle_service::advance(
                &state,
                &table.moderator,
                table.session.id,
                AdvanceRequest::default(),
            )
            .await
            .unwrap();
        }

        submit(
            &state,
            &table.guest,
            table.session.id,
            score_request(second, [8, 6, 7, 9]),
        )
        .await
        .unwrap();

        let revealed = lifecycle_service::reveal(&state, &table.moderator, table.session.id)
            .await
            .unwrap();
        assert_eq!(revealed.whiskeys.len(), 2);

        let results = get_results(&state, &table.guest, table.session.id)
            .await
            .unwrap();
        let first_result = results
            .whiskeys
            .iter()
            .find(|w| w.whiskey.id == first)
            .unwrap();
        assert_eq!(first_result.scores.len(), 1);
        assert_eq!(first_result.averages.unwrap().total, 5.0);
        assert_eq!(first_result.rank, 2);

        let second_result = results
            .whiskeys
            .iter()
            .find(|w| w.whiskey.id == second)
            .unwrap();
        assert_eq!(second_result.averages.unwrap().total, 7.2);
        assert_eq!(second_result.rank, 1);
    }
}
