use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, insert_error},
    models::{
        MongoParticipantDocument, MongoScoreDocument, MongoSessionDocument, MongoWhiskeyDocument,
        doc_id, phase_bson, uuid_as_binary,
    },
};
use crate::dao::{
    models::{ParticipantEntity, ParticipantStatus, ScoreEntity, SessionEntity, WhiskeyEntity},
    session_store::SessionStore,
    storage::{StorageResult, UniqueConstraint},
};
use crate::state::lifecycle::Lifecycle;

const SESSION_COLLECTION: &str = "sessions";
const WHISKEY_COLLECTION: &str = "whiskeys";
const PARTICIPANT_COLLECTION: &str = "participants";
const SCORE_COLLECTION: &str = "scores";

/// MongoDB-backed session store. The unique indexes created at connect time
/// are the authoritative guards for invite codes and the one-score-per-pair
/// invariant; application pre-checks only shape friendlier errors.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl MongoSessionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let sessions = database.collection::<MongoSessionDocument>(SESSION_COLLECTION);
        let invite_index = mongodb::IndexModel::builder()
            .keys(doc! {"invite_code": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("session_invite_code_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        sessions
            .create_index(invite_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION,
                index: "invite_code",
                source,
            })?;

        let whiskeys = database.collection::<MongoWhiskeyDocument>(WHISKEY_COLLECTION);
        let whiskey_index = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "display_number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("whiskey_session_idx".to_owned()))
                    .build(),
            )
            .build();
        whiskeys
            .create_index(whiskey_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: WHISKEY_COLLECTION,
                index: "session_id,display_number",
                source,
            })?;

        let participants = database.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION);
        let token_index = mongodb::IndexModel::builder()
            .keys(doc! {"token": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("participant_token_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        participants
            .create_index(token_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PARTICIPANT_COLLECTION,
                index: "token",
                source,
            })?;

        let scores = database.collection::<MongoScoreDocument>(SCORE_COLLECTION);
        let pair_index = mongodb::IndexModel::builder()
            .keys(doc! {"participant_id": 1, "whiskey_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("score_pair_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        scores
            .create_index(pair_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION,
                index: "participant_id,whiskey_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database().await.collection(SESSION_COLLECTION)
    }

    async fn whiskeys(&self) -> Collection<MongoWhiskeyDocument> {
        self.database().await.collection(WHISKEY_COLLECTION)
    }

    async fn participants(&self) -> Collection<MongoParticipantDocument> {
        self.database().await.collection(PARTICIPANT_COLLECTION)
    }

    async fn scores(&self) -> Collection<MongoScoreDocument> {
        self.database().await.collection(SCORE_COLLECTION)
    }

    async fn insert_session_doc(&self, session: SessionEntity) -> MongoResult<()> {
        let document: MongoSessionDocument = session.into();
        self.sessions()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                insert_error(SESSION_COLLECTION, UniqueConstraint::InviteCode, source)
            })?;
        Ok(())
    }

    async fn find_session_doc(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn find_session_by_invite_doc(
        &self,
        invite_code: String,
    ) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc! {"invite_code": invite_code})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn update_lifecycle_doc(
        &self,
        id: Uuid,
        expected: Lifecycle,
        next: Lifecycle,
        updated_at: SystemTime,
    ) -> MongoResult<bool> {
        let filter = doc! {
            "_id": uuid_as_binary(id),
            "status": expected.status.as_str(),
            "current_phase": phase_bson(expected.phase),
            "current_whiskey_index": expected.whiskey_index as i64,
        };
        let update = doc! {
            "$set": {
                "status": next.status.as_str(),
                "current_phase": phase_bson(next.phase),
                "current_whiskey_index": next.whiskey_index as i64,
                "updated_at": DateTime::from_system_time(updated_at),
            }
        };

        let result = self
            .sessions()
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn delete_session_doc(&self, id: Uuid) -> MongoResult<bool> {
        let session_filter = doc! {"session_id": uuid_as_binary(id)};

        self.scores()
            .await
            .delete_many(session_filter.clone())
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SCORE_COLLECTION,
                source,
            })?;
        self.participants()
            .await
            .delete_many(session_filter.clone())
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PARTICIPANT_COLLECTION,
                source,
            })?;
        self.whiskeys()
            .await
            .delete_many(session_filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: WHISKEY_COLLECTION,
                source,
            })?;

        let result = self
            .sessions()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_whiskeys_docs(&self, session_id: Uuid) -> MongoResult<Vec<WhiskeyEntity>> {
        let documents: Vec<MongoWhiskeyDocument> = self
            .whiskeys()
            .await
            .find(doc! {"session_id": uuid_as_binary(session_id)})
            .sort(doc! {"display_number": 1})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: WHISKEY_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: WHISKEY_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn list_participants_docs(
        &self,
        session_id: Uuid,
    ) -> MongoResult<Vec<ParticipantEntity>> {
        let documents: Vec<MongoParticipantDocument> = self
            .participants()
            .await
            .find(doc! {"session_id": uuid_as_binary(session_id)})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PARTICIPANT_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PARTICIPANT_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_participant_doc(&self, id: Uuid) -> MongoResult<bool> {
        self.scores()
            .await
            .delete_many(doc! {"participant_id": uuid_as_binary(id)})
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SCORE_COLLECTION,
                source,
            })?;

        let result = self
            .participants()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PARTICIPANT_COLLECTION,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_scores_docs(&self, session_id: Uuid) -> MongoResult<Vec<ScoreEntity>> {
        let documents: Vec<MongoScoreDocument> = self
            .scores()
            .await
            .find(doc! {"session_id": uuid_as_binary(session_id)})
            .sort(doc! {"locked_at": 1})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SCORE_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SCORE_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl SessionStore for MongoSessionStore {
    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session_doc(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session_doc(id).await.map_err(Into::into) })
    }

    fn find_session_by_invite(
        &self,
        invite_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_session_by_invite_doc(invite_code)
                .await
                .map_err(Into::into)
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
            store
                .update_lifecycle_doc(id, expected, next, updated_at)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_session_doc(id).await.map_err(Into::into) })
    }

    fn insert_whiskey(&self, whiskey: WhiskeyEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: MongoWhiskeyDocument = whiskey.into();
            store
                .whiskeys()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| MongoDaoError::Insert {
                    collection: WHISKEY_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn list_whiskeys(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WhiskeyEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_whiskeys_docs(session_id).await.map_err(Into::into) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: MongoParticipantDocument = participant.into();
            store
                .participants()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| {
                    insert_error(
                        PARTICIPANT_COLLECTION,
                        UniqueConstraint::ParticipantToken,
                        source,
                    )
                })?;
            Ok(())
        })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .participants()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Load {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(document.map(ParticipantEntity::from))
        })
    }

    fn find_participant_by_token(
        &self,
        token: String,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .participants()
                .await
                .find_one(doc! {"token": token})
                .await
                .map_err(|source| MongoDaoError::Load {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(document.map(ParticipantEntity::from))
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_participants_docs(session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn count_participants(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<usize>> {
        let store = self.clone();
        Box::pin(async move {
            let count = store
                .participants()
                .await
                .count_documents(doc! {"session_id": uuid_as_binary(session_id)})
                .await
                .map_err(|source| MongoDaoError::Load {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(count as usize)
        })
    }

    fn set_participant_ready(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let result = store
                .participants()
                .await
                .update_one(doc_id(id), doc! {"$set": {"is_ready": true}})
                .await
                .map_err(|source| MongoDaoError::Update {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(result.matched_count > 0)
        })
    }

    fn set_participant_status(
        &self,
        id: Uuid,
        status: ParticipantStatus,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let result = store
                .participants()
                .await
                .update_one(doc_id(id), doc! {"$set": {"status": status.as_str()}})
                .await
                .map_err(|source| MongoDaoError::Update {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(result.matched_count > 0)
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
            let result = store
                .participants()
                .await
                .update_one(
                    doc_id(id),
                    doc! {"$set": {
                        "current_whiskey_index": current_whiskey_index as i64,
                        "status": status.as_str(),
                    }},
                )
                .await
                .map_err(|source| MongoDaoError::Update {
                    collection: PARTICIPANT_COLLECTION,
                    source,
                })?;
            Ok(result.matched_count > 0)
        })
    }

    fn delete_participant(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_participant_doc(id).await.map_err(Into::into) })
    }

    fn insert_score(&self, score: ScoreEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: MongoScoreDocument = score.into();
            store
                .scores()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| {
                    insert_error(SCORE_COLLECTION, UniqueConstraint::ScorePair, source)
                })?;
            Ok(())
        })
    }

    fn find_score(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .scores()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Load {
                    collection: SCORE_COLLECTION,
                    source,
                })?;
            Ok(document.map(ScoreEntity::from))
        })
    }

    fn find_score_for_pair(
        &self,
        participant_id: Uuid,
        whiskey_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .scores()
                .await
                .find_one(doc! {
                    "participant_id": uuid_as_binary(participant_id),
                    "whiskey_id": uuid_as_binary(whiskey_id),
                })
                .await
                .map_err(|source| MongoDaoError::Load {
                    collection: SCORE_COLLECTION,
                    source,
                })?;
            Ok(document.map(ScoreEntity::from))
        })
    }

    fn list_scores(&self, session_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_scores_docs(session_id).await.map_err(Into::into) })
    }

    fn set_score_visibility(
        &self,
        id: Uuid,
        is_public: bool,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let result = store
                .scores()
                .await
                .update_one(doc_id(id), doc! {"$set": {"is_public": is_public}})
                .await
                .map_err(|source| MongoDaoError::Update {
                    collection: SCORE_COLLECTION,
                    source,
                })?;
            Ok(result.matched_count > 0)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }
}
