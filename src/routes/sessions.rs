use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        score::SavedScoreResponse,
        session::{RespondResponse, SessionSnapshot},
    },
    error::AppError,
    services::{identity::CurrentUser, session_service},
    state::SharedState,
};

/// Timing session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/start", post(start_attempt))
        .route("/sessions/{id}/respond", post(respond))
        .route("/sessions/{id}/reset", post(reset))
        .route("/sessions/{id}/score", post(save_score))
}

#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    responses((status = 201, description = "Session created in the idle phase", body = SessionSnapshot))
)]
/// Create a new game session.
pub async fn create_session(
    State(state): State<SharedState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let snapshot = session_service::create_session(&state).await;
    (StatusCode::CREATED, Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::get_session(&state, id).await?))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 204, description = "Session dropped"),
        (status = 404, description = "Unknown session")
    )
)]
/// Drop a session and cancel its pending stimulus.
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Attempt armed; the stimulus goes live after a random delay", body = SessionSnapshot),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "An attempt is already armed or live")
    )
)]
/// Start an attempt.
pub async fn start_attempt(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::start_attempt(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/respond",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "False start or measurement", body = RespondResponse),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "No attempt in progress")
    )
)]
/// Register the user's response.
pub async fn respond(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RespondResponse>, AppError> {
    Ok(Json(session_service::respond(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session back to idle", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn reset(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(session_service::reset(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/score",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("X-User-Id" = String, Header, description = "Authenticated user identifier"),
        ("X-User-Label" = Option<String>, Header, description = "Display label, defaults to the user identifier")
    ),
    responses(
        (status = 201, description = "Measurement saved", body = SavedScoreResponse),
        (status = 401, description = "Missing user identity"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Nothing settled, or this attempt was already saved"),
        (status = 503, description = "Score store unavailable; retry later")
    )
)]
/// Save the settled measurement for the calling user.
pub async fn save_score(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<SavedScoreResponse>), AppError> {
    let saved = session_service::save_score(&state, id, user).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}
