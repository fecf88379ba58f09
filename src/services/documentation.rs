use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Reflex Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::delete_session,
        crate::routes::sessions::start_attempt,
        crate::routes::sessions::respond,
        crate::routes::sessions::reset,
        crate::routes::sessions::save_score,
        crate::routes::sse::session_stream,
        crate::routes::scores::top_scores,
        crate::routes::scores::user_scores,
        crate::routes::scores::user_best,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionSnapshot,
            crate::dto::session::VisiblePhase,
            crate::dto::session::OutcomeDto,
            crate::dto::session::RespondResponse,
            crate::dto::score::Rating,
            crate::dto::score::ScoreSummary,
            crate::dto::score::TopScoresResponse,
            crate::dto::score::UserScoresResponse,
            crate::dto::score::UserBestResponse,
            crate::dto::score::SavedScoreResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::PhaseChangedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Reaction-time game sessions"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "scores", description = "Leaderboard and personal history"),
    )
)]
pub struct ApiDoc;
