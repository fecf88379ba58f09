use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    connection::{ConnectRetry, establish_connection},
    error::{MongoDaoError, MongoResult},
    models::MongoScoreDocument,
};
use crate::dao::{
    models::{NewScoreEntity, ScoreEntity, ScoreId},
    score_store::ScoreStore,
    storage::StorageResult,
};

const SCORE_COLLECTION_NAME: &str = "scores";

#[derive(Clone)]
pub struct MongoScoreStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
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

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config, ConnectRetry::default()).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

impl MongoScoreStore {
    /// Establish a connection to MongoDB and ensure the ranking indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config, ConnectRetry::default()).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        let ranking = mongodb::IndexModel::builder()
            .keys(doc! {"score": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("score_rank_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(ranking)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION_NAME,
                index: "score",
                source,
            })?;

        let per_user = mongodb::IndexModel::builder()
            .keys(doc! {"user_id": 1, "score": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_score_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(per_user)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SCORE_COLLECTION_NAME,
                index: "user_id,score",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoScoreDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoScoreDocument>(SCORE_COLLECTION_NAME)
    }

    async fn insert_score(&self, score: NewScoreEntity) -> MongoResult<ScoreId> {
        let user_id = score.user_id.clone();
        let document: MongoScoreDocument = score.into();
        let collection = self.collection().await;

        let result = collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertScore { user_id, source })?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or(MongoDaoError::MissingInsertedId)?;
        debug!(id = %id, "score inserted");
        Ok(ScoreId::new(id.to_hex()))
    }

    async fn top_scores(&self, limit: usize) -> MongoResult<Vec<ScoreEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoScoreDocument> = collection
            .find(doc! {})
            .sort(doc! {"score": 1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::QueryScores {
                query: "top",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryScores {
                query: "top",
                source,
            })?;

        Ok(documents
            .into_iter()
            .filter_map(MongoScoreDocument::into_entity)
            .collect())
    }

    async fn user_scores(&self, user_id: String) -> MongoResult<Vec<ScoreEntity>> {
        let collection = self.collection().await;

        let documents: Vec<MongoScoreDocument> = collection
            .find(doc! {"user_id": user_id.as_str()})
            .sort(doc! {"score": 1})
            .await
            .map_err(|source| MongoDaoError::QueryScores {
                query: "user scores",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryScores {
                query: "user scores",
                source,
            })?;

        Ok(documents
            .into_iter()
            .filter_map(MongoScoreDocument::into_entity)
            .collect())
    }

    async fn user_best(&self, user_id: String) -> MongoResult<Option<ScoreEntity>> {
        let collection = self.collection().await;

        let document = collection
            .find_one(doc! {"user_id": user_id.as_str()})
            .sort(doc! {"score": 1})
            .await
            .map_err(|source| MongoDaoError::QueryScores {
                query: "user best",
                source,
            })?;

        Ok(document.and_then(MongoScoreDocument::into_entity))
    }
}

impl ScoreStore for MongoScoreStore {
    fn insert_score(&self, score: NewScoreEntity) -> BoxFuture<'static, StorageResult<ScoreId>> {
        let store = self.clone();
        Box::pin(async move { store.insert_score(score).await.map_err(Into::into) })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.top_scores(limit).await.map_err(Into::into) })
    }

    fn user_scores(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.user_scores(user_id).await.map_err(Into::into) })
    }

    fn user_best(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.user_best(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
