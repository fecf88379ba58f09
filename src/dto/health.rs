use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of live game sessions.
    pub sessions: usize,
}

impl HealthResponse {
    /// The score store is reachable.
    pub fn ok(sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            sessions,
        }
    }

    /// No score store; sessions still run but scores cannot be read or saved.
    pub fn degraded(sessions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            sessions,
        }
    }
}
