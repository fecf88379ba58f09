use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dto::score::{TopScoresQuery, TopScoresResponse, UserBestResponse, UserScoresResponse},
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Leaderboard and per-user history endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/scores/top", get(top_scores))
        .route("/users/{user_id}/scores", get(user_scores))
        .route("/users/{user_id}/best", get(user_best))
}

#[utoipa::path(
    get,
    path = "/scores/top",
    tag = "scores",
    params(TopScoresQuery),
    responses(
        (status = 200, description = "Best scores across all users, lowest first", body = TopScoresResponse),
        (status = 400, description = "Invalid limit"),
        (status = 503, description = "Score store unavailable")
    )
)]
/// Return the global leaderboard.
pub async fn top_scores(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<TopScoresQuery>>,
) -> Result<Json<TopScoresResponse>, AppError> {
    Ok(Json(score_service::top_scores(&state, query.limit).await?))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/scores",
    tag = "scores",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Every score of the user, lowest first", body = UserScoresResponse),
        (status = 400, description = "Invalid user identifier"),
        (status = 503, description = "Score store unavailable")
    )
)]
/// Return a user's full history.
pub async fn user_scores(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserScoresResponse>, AppError> {
    Ok(Json(score_service::user_scores(&state, user_id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/best",
    tag = "scores",
    params(("user_id" = String, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Best score of the user, `best` is null when none", body = UserBestResponse),
        (status = 400, description = "Invalid user identifier"),
        (status = 503, description = "Score store unavailable")
    )
)]
/// Return a user's best score.
pub async fn user_best(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserBestResponse>, AppError> {
    Ok(Json(score_service::user_best(&state, user_id).await?))
}
