//! In-process score store backed by an ordered map.

use std::{collections::BTreeMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::{
    models::{NewScoreEntity, ScoreEntity, ScoreId},
    score_store::ScoreStore,
    storage::StorageResult,
};

/// Ordering key: ascending score, then insertion order for equal scores.
type RankKey = (i64, u64);

/// Score store keeping every record in memory, sorted by score.
///
/// Data does not survive a restart. Meant for local development and tests.
#[derive(Clone, Default)]
pub struct InMemoryScoreStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    next_seq: u64,
    ranked: BTreeMap<RankKey, ScoreEntity>,
}

impl InMemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, score: NewScoreEntity) -> ScoreId {
        let id = ScoreId::new(Uuid::new_v4().simple().to_string());
        let mut guard = self.inner.write().await;
        let seq = guard.next_seq;
        guard.next_seq += 1;
        guard
            .ranked
            .insert((score.score, seq), score.with_id(id.clone()));
        id
    }

    async fn top(&self, limit: usize) -> Vec<ScoreEntity> {
        let guard = self.inner.read().await;
        guard.ranked.values().take(limit).cloned().collect()
    }

    async fn for_user(&self, user_id: &str, limit: Option<usize>) -> Vec<ScoreEntity> {
        let guard = self.inner.read().await;
        guard
            .ranked
            .values()
            .filter(|entry| entry.user_id == user_id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

impl ScoreStore for InMemoryScoreStore {
    fn insert_score(&self, score: NewScoreEntity) -> BoxFuture<'static, StorageResult<ScoreId>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.insert(score).await) })
    }

    fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.top(limit).await) })
    }

    fn user_scores(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.for_user(&user_id, None).await) })
    }

    fn user_best(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.for_user(&user_id, Some(1)).await.into_iter().next()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{REACTION_TIME_GAME_TYPE, timestamp_now};

    fn score(user_id: &str, score: i64) -> NewScoreEntity {
        NewScoreEntity {
            user_id: user_id.into(),
            label: format!("{user_id}@example.com"),
            score,
            game_type: REACTION_TIME_GAME_TYPE.into(),
            timestamp: timestamp_now(),
        }
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let store = InMemoryScoreStore::new();
        let first = store.insert_score(score("a", 180)).await.unwrap();
        let second = store.insert_score(score("b", 180)).await.unwrap();
        store.insert_score(score("c", 90)).await.unwrap();

        let top = store.top_scores(3).await.unwrap();
        let ids: Vec<_> = top.iter().map(|entry| entry.id.clone()).collect();
        assert_eq!(top[0].score, 90);
        assert_eq!(ids[1..], [first, second]);
    }

    #[tokio::test]
    async fn identifiers_are_unique() {
        let store = InMemoryScoreStore::new();
        let a = store.insert_score(score("a", 300)).await.unwrap();
        let b = store.insert_score(score("a", 300)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.user_scores("a".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn user_projection_filters_other_users() {
        let store = InMemoryScoreStore::new();
        store.insert_score(score("a", 300)).await.unwrap();
        store.insert_score(score("b", 100)).await.unwrap();
        store.insert_score(score("a", 200)).await.unwrap();

        let scores: Vec<_> = store
            .user_scores("a".into())
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.score)
            .collect();
        assert_eq!(scores, vec![200, 300]);
        assert_eq!(
            store.user_best("a".into()).await.unwrap().map(|e| e.score),
            Some(200)
        );
        assert!(store.user_best("nobody".into()).await.unwrap().is_none());
    }
}
