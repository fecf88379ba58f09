use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::session::{OutcomeDto, VisiblePhase};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial event sent to an SSE client when it connects.
pub struct Handshake {
    pub session_id: Uuid,
    pub phase: VisiblePhase,
    /// Whether scores can currently be saved.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on every phase transition of a session. Clients show the stimulus
/// when `phase` becomes `live`.
pub struct PhaseChangedEvent {
    pub session_id: Uuid,
    pub phase: VisiblePhase,
    pub attempt: u64,
    pub last_outcome: Option<OutcomeDto>,
}
