use crate::{
    dto::{
        score::{ScoreSummary, TopScoresResponse, UserBestResponse, UserScoresResponse},
        validation::validate_user_id,
    },
    error::ServiceError,
    state::SharedState,
};

/// Leaderboard across all users. `limit` falls back to the configured default.
pub async fn top_scores(
    state: &SharedState,
    limit: Option<usize>,
) -> Result<TopScoresResponse, ServiceError> {
    let config = state.config();
    let limit = limit.unwrap_or(config.default_top_limit());
    if limit > config.max_top_limit() {
        return Err(ServiceError::InvalidInput(format!(
            "limit must be at most {} (got {limit})",
            config.max_top_limit()
        )));
    }

    let repository = state.score_repository().await?;
    let scores = repository.get_top(limit).await?;
    Ok(TopScoresResponse {
        scores: scores.into_iter().map(Into::into).collect(),
    })
}

/// Every score of `user_id`, best first.
pub async fn user_scores(
    state: &SharedState,
    user_id: String,
) -> Result<UserScoresResponse, ServiceError> {
    check_user_id(&user_id)?;
    let repository = state.score_repository().await?;
    let scores = repository.get_user_scores(&user_id).await?;
    Ok(UserScoresResponse {
        user_id,
        scores: scores.into_iter().map(Into::into).collect(),
    })
}

/// Best score of `user_id`, if any.
pub async fn user_best(
    state: &SharedState,
    user_id: String,
) -> Result<UserBestResponse, ServiceError> {
    check_user_id(&user_id)?;
    let repository = state.score_repository().await?;
    let best = repository.get_user_best(&user_id).await?;
    Ok(UserBestResponse {
        user_id,
        best: best.map(ScoreSummary::from),
    })
}

fn check_user_id(user_id: &str) -> Result<(), ServiceError> {
    validate_user_id(user_id).map_err(|err| ServiceError::InvalidInput(err.to_string()))
}
