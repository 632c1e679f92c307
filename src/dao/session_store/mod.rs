pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{ParticipantEntity, ParticipantStatus, ScoreEntity, SessionEntity, WhiskeyEntity};
use crate::dao::storage::StorageResult;
use crate::state::lifecycle::Lifecycle;

/// Abstraction over the persistence layer for sessions, whiskeys,
/// participants, and scores.
///
/// Backends must uphold two invariants the services rely on:
/// `insert_score` rejects a second score for the same (participant, whiskey)
/// pair with a duplicate error, and `update_session_lifecycle` only writes
/// when the stored lifecycle still matches `expected`.
pub trait SessionStore: Send + Sync {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn find_session_by_invite(
        &self,
        invite_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// Conditionally move a session's lifecycle from `expected` to `next`,
    /// bumping `updated_at`. Returns `false` when the stored lifecycle no
    /// longer matches `expected`.
    fn update_session_lifecycle(
        &self,
        id: Uuid,
        expected: Lifecycle,
        next: Lifecycle,
        updated_at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a session and cascade its whiskeys, participants, and scores.
    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_whiskey(&self, whiskey: WhiskeyEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Whiskeys of a session, ordered by display number.
    fn list_whiskeys(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WhiskeyEntity>>>;

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn find_participant_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>>;
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    fn count_participants(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<usize>>;
    fn set_participant_ready(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn set_participant_status(
        &self,
        id: Uuid,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Record a participant's personal progress after a locked score.
    fn record_participant_progress(
        &self,
        id: Uuid,
        current_whiskey_index: usize,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a participant and cascade their scores.
    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_score(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>>;
    fn find_score_for_pair(
        &self,
        participant_id: Uuid,
        whiskey_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>>;
    fn list_scores(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>>;
    fn set_score_visibility(
        &self,
        id: Uuid,
        is_public: bool,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
