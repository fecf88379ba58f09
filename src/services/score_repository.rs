use std::{sync::Arc, time::UNIX_EPOCH};

use tracing::{debug, warn};

use crate::{
    dao::{
        models::{NewScoreEntity, ScoreEntity, ScoreId, truncate_to_millis},
        score_store::ScoreStore,
    },
    error::ServiceError,
};

/// Append-only score persistence with the three ranking projections.
///
/// Store failures are returned as [`ServiceError::Unavailable`] and never retried
/// here. Malformed records are rejected before the store is touched.
#[derive(Clone)]
pub struct ScoreRepository {
    store: Arc<dyn ScoreStore>,
}

impl ScoreRepository {
    /// Repository backed by `store`.
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }

    /// Persist a new record and return the identifier the store assigned.
    ///
    /// No deduplication: saving the same values twice creates two records.
    /// Timestamps are kept to the millisecond; finer precision is dropped
    /// before the store sees the record.
    pub async fn save(&self, mut record: NewScoreEntity) -> Result<ScoreId, ServiceError> {
        validate_record(&record)?;
        record.timestamp = truncate_to_millis(record.timestamp);

        let user_id = record.user_id.clone();
        let score = record.score;
        match self.store.insert_score(record).await {
            Ok(id) => {
                debug!(%user_id, score, score_id = %id, "score saved");
                Ok(id)
            }
            Err(err) => {
                warn!(%user_id, score, error = %err, "failed to save score");
                Err(err.into())
            }
        }
    }

    /// Up to `n` records across all users, best first.
    pub async fn get_top(&self, n: usize) -> Result<Vec<ScoreEntity>, ServiceError> {
        if n == 0 {
            return Err(ServiceError::InvalidInput(
                "leaderboard size must be a positive integer".into(),
            ));
        }
        let mut scores = self.store.top_scores(n).await?;
        scores.truncate(n);
        Ok(scores)
    }

    /// Every record of `user_id`, best first.
    pub async fn get_user_scores(&self, user_id: &str) -> Result<Vec<ScoreEntity>, ServiceError> {
        Ok(self.store.user_scores(user_id.to_owned()).await?)
    }

    /// Best record of `user_id`, `None` when the user never saved one.
    pub async fn get_user_best(&self, user_id: &str) -> Result<Option<ScoreEntity>, ServiceError> {
        Ok(self.store.user_best(user_id.to_owned()).await?)
    }
}

fn validate_record(record: &NewScoreEntity) -> Result<(), ServiceError> {
    if record.user_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("user id must not be empty".into()));
    }
    if record.score < 0 {
        return Err(ServiceError::InvalidInput(format!(
            "score must be non-negative (got {})",
            record.score
        )));
    }
    if record.game_type.trim().is_empty() {
        return Err(ServiceError::InvalidInput("game type must not be empty".into()));
    }
    if record.timestamp < UNIX_EPOCH {
        return Err(ServiceError::InvalidInput(
            "timestamp must not precede the Unix epoch".into(),
        ));
    }
    Ok(())
}
