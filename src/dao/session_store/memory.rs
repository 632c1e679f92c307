//! In-memory storage backend backed by concurrent maps. Used for local
//! development without a database and as the store under service tests.

use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{ParticipantEntity, ParticipantStatus, ScoreEntity, SessionEntity, WhiskeyEntity},
    session_store::SessionStore,
    storage::{StorageError, StorageResult, UniqueConstraint},
};
use crate::state::lifecycle::Lifecycle;

/// Storage backend holding every table in process memory.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Tables>,
}

#[derive(Default)]
struct Tables {
    sessions: DashMap<Uuid, SessionEntity>,
    invite_index: DashMap<String, Uuid>,
    whiskeys: DashMap<Uuid, WhiskeyEntity>,
    participants: DashMap<Uuid, ParticipantEntity>,
    token_index: DashMap<String, Uuid>,
    scores: DashMap<Uuid, ScoreEntity>,
    // Pair index doubling as the unique (participant, whiskey) constraint;
    // the entry API makes check-and-insert atomic per shard.
    score_pairs: DashMap<(Uuid, Uuid), Uuid>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_session_sync(&self, session: SessionEntity) -> StorageResult<()> {
        match self.inner.invite_index.entry(session.invite_code.clone()) {
            Entry::Occupied(_) => Err(StorageError::duplicate(UniqueConstraint::InviteCode)),
            Entry::Vacant(slot) => {
                slot.insert(session.id);
                self.inner.sessions.insert(session.id, session);
                Ok(())
            }
        }
    }

    fn update_session_lifecycle_sync(
        &self,
        id: Uuid,
        expected: Lifecycle,
        next: Lifecycle,
        updated_at: SystemTime,
    ) -> bool {
        let Some(mut session) = self.inner.sessions.get_mut(&id) else {
            return false;
        };

        if session.lifecycle() != expected {
            return false;
        }

        session.status = next.status;
        session.current_phase = next.phase;
        session.current_whiskey_index = next.whiskey_index;
        session.updated_at = updated_at;
        true
    }

    fn delete_session_sync(&self, id: Uuid) -> bool {
        let Some((_, session)) = self.inner.sessions.remove(&id) else {
            return false;
        };
        self.inner.invite_index.remove(&session.invite_code);

        self.inner.whiskeys.retain(|_, w| w.session_id != id);

        let seats: Vec<Uuid> = self
            .inner
            .participants
            .iter()
            .filter(|entry| entry.session_id == id)
            .map(|entry| entry.id)
            .collect();
        for participant_id in seats {
            self.delete_participant_sync(participant_id);
        }

        // Scores cascade through participants, but sweep strays as well.
        self.inner.scores.retain(|_, s| s.session_id != id);
        self.inner
            .score_pairs
            .retain(|_, score_id| self.inner.scores.contains_key(score_id));
        true
    }

    fn insert_participant_sync(&self, participant: ParticipantEntity) -> StorageResult<()> {
        match self.inner.token_index.entry(participant.token.clone()) {
            Entry::Occupied(_) => Err(StorageError::duplicate(UniqueConstraint::ParticipantToken)),
            Entry::Vacant(slot) => {
                slot.insert(participant.id);
                self.inner.participants.insert(participant.id, participant);
                Ok(())
            }
        }
    }

    fn delete_participant_sync(&self, id: Uuid) -> bool {
        let Some((_, participant)) = self.inner.participants.remove(&id) else {
            return false;
        };
        self.inner.token_index.remove(&participant.token);

        let orphaned: Vec<Uuid> = self
            .inner
            .scores
            .iter()
            .filter(|entry| entry.participant_id == id)
            .map(|entry| entry.id)
            .collect();
        for score_id in orphaned {
            if let Some((_, score)) = self.inner.scores.remove(&score_id) {
                self.inner
                    .score_pairs
                    .remove(&(score.participant_id, score.whiskey_id));
            }
        }
        true
    }

    fn insert_score_sync(&self, score: ScoreEntity) -> StorageResult<()> {
        match self
            .inner
            .score_pairs
            .entry((score.participant_id, score.whiskey_id))
        {
            Entry::Occupied(_) => Err(StorageError::duplicate(UniqueConstraint::ScorePair)),
            Entry::Vacant(slot) => {
                slot.insert(score.id);
                self.inner.scores.insert(score.id, score);
                Ok(())
            }
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session_sync(session) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.sessions.get(&id).map(|entry| entry.clone())) })
    }

    fn find_session_by_invite(
        &self,
        invite_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let id = store.inner.invite_index.get(&invite_code).map(|e| *e);
            Ok(id.and_then(|id| store.inner.sessions.get(&id).map(|entry| entry.clone())))
        })
    }

    fn update_session_lifecycle(
        &self,
        id: Uuid,
        expected: Lifecycle,
        next: Lifecycle,
        updated_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.update_session_lifecycle_sync(id, expected, next, updated_at))
        })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_session_sync(id)) })
    }

    fn insert_whiskey(&self, whiskey: WhiskeyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.whiskeys.insert(whiskey.id, whiskey);
            Ok(())
        })
    }

    fn list_whiskeys(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WhiskeyEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut whiskeys: Vec<WhiskeyEntity> = store
                .inner
                .whiskeys
                .iter()
                .filter(|entry| entry.session_id == session_id)
                .map(|entry| entry.clone())
                .collect();
            whiskeys.sort_by_key(|w| w.display_number);
            Ok(whiskeys)
        })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_participant_sync(participant) })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.participants.get(&id).map(|entry| entry.clone())) })
    }

    fn find_participant_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let id = store.inner.token_index.get(&token).map(|e| *e);
            Ok(id.and_then(|id| store.inner.participants.get(&id).map(|entry| entry.clone())))
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut participants: Vec<ParticipantEntity> = store
                .inner
                .participants
                .iter()
                .filter(|entry| entry.session_id == session_id)
                .map(|entry| entry.clone())
                .collect();
            participants.sort_by_key(|p| p.joined_at);
            Ok(participants)
        })
    }

    fn count_participants(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .participants
                .iter()
                .filter(|entry| entry.session_id == session_id)
                .count())
        })
    }

    fn set_participant_ready(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.participants.get_mut(&id) {
                Some(mut participant) => {
                    participant.is_ready = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn set_participant_status(
        &self,
        id: Uuid,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.participants.get_mut(&id) {
                Some(mut participant) => {
                    participant.status = status;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn record_participant_progress(
        &self,
        id: Uuid,
        current_whiskey_index: usize,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.participants.get_mut(&id) {
                Some(mut participant) => {
                    participant.current_whiskey_index = current_whiskey_index;
                    participant.status = status;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_participant_sync(id)) })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_score_sync(score) })
    }

    fn find_score(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.scores.get(&id).map(|entry| entry.clone())) })
    }

    fn find_score_for_pair(
        &self,
        participant_id: Uuid,
        whiskey_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let id = store
                .inner
                .score_pairs
                .get(&(participant_id, whiskey_id))
                .map(|e| *e);
            Ok(id.and_then(|id| store.inner.scores.get(&id).map(|entry| entry.clone())))
        })
    }

    fn list_scores(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut scores: Vec<ScoreEntity> = store
                .inner
                .scores
                .iter()
                .filter(|entry| entry.session_id == session_id)
                .map(|entry| entry.clone())
                .collect();
            scores.sort_by_key(|s| s.locked_at);
            Ok(scores)
        })
    }

    fn set_score_visibility(
        &self,
        id: Uuid,
        is_public: bool,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.inner.scores.get_mut(&id) {
                Some(mut score) => {
                    score.is_public = is_public;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lifecycle::SessionStatus;

    fn session(invite: &str) -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            id: Uuid::new_v4(),
            invite_code: invite.to_string(),
            name: "Friday flight".to_string(),
            theme: crate::dao::models::SessionTheme::Bourbon,
            custom_theme: None,
            proof_range: None,
            scheduled_for: None,
            status: SessionStatus::Waiting,
            current_phase: None,
            current_whiskey_index: 0,
            moderator_id: Uuid::new_v4(),
            max_participants: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn score(session_id: Uuid, participant_id: Uuid, whiskey_id: Uuid) -> ScoreEntity {
        ScoreEntity {
            id: Uuid::new_v4(),
            session_id,
            whiskey_id,
            participant_id,
            nose: 5,
            palate: 5,
            finish: 5,
            overall: 5,
            total_score: 5.0,
            nose_notes: None,
            palate_notes: None,
            finish_notes: None,
            overall_notes: None,
            identity_guess: None,
            is_public: false,
            locked_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn invite_codes_are_unique() {
        let store = MemorySessionStore::new();
        store.insert_session(session("ABC234")).await.unwrap();
        let err = store.insert_session(session("ABC234")).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Duplicate {
                constraint: UniqueConstraint::InviteCode
            }
        ));
    }

    #[tokio::test]
    async fn second_score_for_same_pair_is_rejected() {
        let store = MemorySessionStore::new();
        let (session_id, participant_id, whiskey_id) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store
            .insert_score(score(session_id, participant_id, whiskey_id))
            .await
            .unwrap();
        let err = store
            .insert_score(score(session_id, participant_id, whiskey_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Duplicate {
                constraint: UniqueConstraint::ScorePair
            }
        ));
    }

    #[tokio::test]
    async fn lifecycle_update_is_conditional() {
        let store = MemorySessionStore::new();
        let entity = session("XYZ789");
        let id = entity.id;
        let from = entity.lifecycle();
        store.insert_session(entity).await.unwrap();

        let next = Lifecycle {
            status: SessionStatus::Active,
            phase: Some(crate::state::lifecycle::TastingPhase::Pour),
            whiskey_index: 0,
        };

        assert!(
            store
                .update_session_lifecycle(id, from, next, SystemTime::now())
                .await
                .unwrap()
        );
        // Stale expectation no longer matches.
        assert!(
            !store
                .update_session_lifecycle(id, from, next, SystemTime::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn deleting_a_participant_cascades_scores() {
        let store = MemorySessionStore::new();
        let session_id = Uuid::new_v4();
        let participant_id = Uuid::new_v4();
        let whiskey_id = Uuid::new_v4();

        store
            .insert_participant(ParticipantEntity {
                id: participant_id,
                session_id,
                user_id: None,
                display_name: "Sam".to_string(),
                status: ParticipantStatus::Waiting,
                is_ready: false,
                current_whiskey_index: 0,
                token: Uuid::new_v4().simple().to_string(),
                joined_at: SystemTime::now(),
            })
            .await
            .unwrap();
        store
            .insert_score(score(session_id, participant_id, whiskey_id))
            .await
            .unwrap();

        assert!(store.delete_participant(participant_id).await.unwrap());
        assert!(store.list_scores(session_id).await.unwrap().is_empty());
        // The pair is free again for a rejoined participant.
        store
            .insert_score(score(session_id, participant_id, whiskey_id))
            .await
            .unwrap();
    }
}
