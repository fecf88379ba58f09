use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{format_system_time, score::Rating},
    state::{
        session::{SaveState, SessionView},
        timing_engine::{AttemptOutcome, TimingPhase},
    },
};

/// Phase of a timing session as exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Waiting for the user to start an attempt.
    Idle,
    /// Waiting for the stimulus; responding now is a false start.
    Armed,
    /// Stimulus visible; respond as fast as possible.
    Live,
    /// Attempt measured.
    Settled,
}

impl From<TimingPhase> for VisiblePhase {
    fn from(value: TimingPhase) -> Self {
        match value {
            TimingPhase::Idle => VisiblePhase::Idle,
            TimingPhase::Armed => VisiblePhase::Armed,
            TimingPhase::Live => VisiblePhase::Live,
            TimingPhase::Settled => VisiblePhase::Settled,
        }
    }
}

/// Result of the latest attempt.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDto {
    /// Responded before the stimulus.
    FalseStart,
    /// Measured reaction time.
    Measurement { reaction_ms: u64, rating: Rating },
}

impl From<AttemptOutcome> for OutcomeDto {
    fn from(value: AttemptOutcome) -> Self {
        match value {
            AttemptOutcome::FalseStart => OutcomeDto::FalseStart,
            AttemptOutcome::Measurement(ms) => OutcomeDto::Measurement {
                reaction_ms: ms,
                rating: Rating::of(ms),
            },
        }
    }
}

/// Full view of a session returned by every session route.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: Uuid,
    /// Phase as shown to the player; the stimulus delay is never exposed.
    pub phase: VisiblePhase,
    /// Increments with every started attempt.
    pub attempt: u64,
    /// Outcome of the most recent settled attempt.
    pub last_outcome: Option<OutcomeDto>,
    /// Whether the settled measurement has been saved.
    pub saved: bool,
    /// Identifier of the saved score, when `saved` is true.
    pub score_id: Option<String>,
    /// Creation time, RFC 3339.
    pub created_at: String,
}

impl From<&SessionView> for SessionSnapshot {
    fn from(value: &SessionView) -> Self {
        let score_id = match &value.save {
            SaveState::Saved(id) => Some(id.to_string()),
            SaveState::Unsaved | SaveState::Saving => None,
        };
        Self {
            id: value.id,
            phase: value.engine.phase.into(),
            attempt: value.engine.generation,
            last_outcome: value.engine.last_outcome.map(Into::into),
            saved: score_id.is_some(),
            score_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Answer to `POST /sessions/{id}/respond`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RespondResponse {
    pub outcome: OutcomeDto,
    pub session: SessionSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_is_tagged() {
        let value = serde_json::to_value(OutcomeDto::from(AttemptOutcome::Measurement(187))).unwrap();
        assert_eq!(value["kind"], "measurement");
        assert_eq!(value["reaction_ms"], 187);
        assert_eq!(value["rating"], "excellent");

        let value = serde_json::to_value(OutcomeDto::from(AttemptOutcome::FalseStart)).unwrap();
        assert_eq!(value["kind"], "false_start");
    }
}
