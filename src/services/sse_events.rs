use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::VisiblePhase,
        sse::{Handshake, PhaseChangedEvent, ServerEvent},
    },
    state::{SseHub, session::SessionView},
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_HANDSHAKE: &str = "handshake";

/// Broadcast the session's new phase to its subscribers.
pub fn broadcast_phase_changed(hub: &SseHub, view: &SessionView) {
    let payload = PhaseChangedEvent {
        session_id: view.id,
        phase: view.engine.phase.into(),
        attempt: view.engine.generation,
        last_outcome: view.engine.last_outcome.map(Into::into),
    };
    send_event(hub, EVENT_PHASE_CHANGED, &payload);
}

/// Build the first event of a new SSE subscription.
pub fn handshake_event(view: &SessionView, degraded: bool) -> Option<ServerEvent> {
    let payload = Handshake {
        session_id: view.id,
        phase: VisiblePhase::from(view.engine.phase),
        degraded,
    };
    match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize SSE handshake");
            None
        }
    }
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize session SSE payload"),
    }
}
