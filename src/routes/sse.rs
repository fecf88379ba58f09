use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sessions/{id}/events",
    tag = "sse",
    params(("id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "`handshake` then one `phase_changed` event per transition", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session")
    )
)]
/// Stream the session's phase changes; the client shows the stimulus on `live`.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, handshake) = sse_service::subscribe_session(&state, id).await?;
    Ok(sse_service::to_sse_stream(receiver, handshake, id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{id}/events", get(session_stream))
}
