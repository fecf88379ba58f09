use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{NewScoreEntity, timestamp_now},
        storage::StorageError,
    },
    dto::{
        score::SavedScoreResponse,
        session::{RespondResponse, SessionSnapshot},
    },
    error::ServiceError,
    services::identity::CurrentUser,
    state::SharedState,
};

/// Create a new idle session.
pub async fn create_session(state: &SharedState) -> SessionSnapshot {
    let session = state.create_session();
    info!(session_id = %session.id(), "session created");
    SessionSnapshot::from(&session.view().await)
}

/// Current view of a session.
pub async fn get_session(state: &SharedState, id: Uuid) -> Result<SessionSnapshot, ServiceError> {
    let session = state.session(id)?;
    Ok(SessionSnapshot::from(&session.view().await))
}

/// Drop a session, cancelling its pending timer.
pub async fn delete_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let session = state
        .remove_session(id)
        .ok_or_else(|| ServiceError::NotFound(format!("session `{id}` not found")))?;
    session.shutdown().await;
    info!(session_id = %id, "session deleted");
    Ok(())
}

/// Arm a new attempt.
pub async fn start_attempt(state: &SharedState, id: Uuid) -> Result<SessionSnapshot, ServiceError> {
    let session = state.session(id)?;
    let view = session.start_attempt().await?;
    Ok(SessionSnapshot::from(&view))
}

/// Register the user's response.
pub async fn respond(state: &SharedState, id: Uuid) -> Result<RespondResponse, ServiceError> {
    let session = state.session(id)?;
    let (outcome, view) = session.respond().await?;
    Ok(RespondResponse {
        outcome: outcome.into(),
        session: SessionSnapshot::from(&view),
    })
}

/// Return the session to idle.
pub async fn reset(state: &SharedState, id: Uuid) -> Result<SessionSnapshot, ServiceError> {
    let session = state.session(id)?;
    Ok(SessionSnapshot::from(&session.reset().await))
}

/// Save the session's settled measurement for `user`.
///
/// At most one save per attempt succeeds. A failed save releases the claim so
/// the user can retry.
pub async fn save_score(
    state: &SharedState,
    id: Uuid,
    user: CurrentUser,
) -> Result<SavedScoreResponse, ServiceError> {
    let session = state.session(id)?;
    let repository = state.score_repository().await?;
    let ticket = session.begin_save().await?;

    let record = NewScoreEntity {
        user_id: user.id,
        label: user.label,
        score: i64::try_from(ticket.measurement).unwrap_or(i64::MAX),
        game_type: state.config().game_type().to_owned(),
        timestamp: timestamp_now(),
    };

    // Detached so the claim is always released, even if the client goes away mid-save.
    let task_session = session.clone();
    let task_record = record.clone();
    let handle = tokio::spawn(async move {
        let result = repository.save(task_record).await;
        task_session
            .finish_save(ticket, result.as_ref().ok().cloned())
            .await;
        result
    });

    let id = match handle.await {
        Ok(result) => result?,
        Err(err) => {
            warn!(session_id = %session.id(), error = %err, "score save task failed");
            return Err(StorageError::unavailable("score save task failed".into(), err).into());
        }
    };

    info!(
        session_id = %session.id(),
        user_id = %record.user_id,
        score = record.score,
        score_id = %id,
        "measurement saved"
    );
    Ok(SavedScoreResponse {
        score: record.with_id(id).into(),
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::score_store::memory::InMemoryScoreStore,
        dto::session::{OutcomeDto, VisiblePhase},
        state::AppState,
    };

    fn user() -> CurrentUser {
        CurrentUser {
            id: "u1".into(),
            label: "ada@example.com".into(),
        }
    }

    async fn settled_session(state: &SharedState) -> Uuid {
        let id = create_session(state).await.id;
        start_attempt(state, id).await.unwrap();
        tokio::time::advance(Duration::from_millis(5_000)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_millis(250)).await;
        let response = respond(state, id).await.unwrap();
        assert!(matches!(response.outcome, OutcomeDto::Measurement { .. }));
        id
    }

    #[tokio::test(start_paused = true)]
    async fn saves_once_per_attempt() {
        let state = AppState::new(AppConfig::default());
        state
            .install_score_store(Arc::new(InMemoryScoreStore::new()))
            .await;
        let id = settled_session(&state).await;

        let saved = save_score(&state, id, user()).await.unwrap();
        assert_eq!(saved.score.user_id, "u1");
        assert_eq!(saved.score.label, "ada@example.com");
        assert_eq!(saved.score.game_type, "reaction-time");

        assert!(matches!(
            save_score(&state, id, user()).await,
            Err(ServiceError::InvalidState(_))
        ));

        let snapshot = get_session(&state, id).await.unwrap();
        assert!(snapshot.saved);
        assert_eq!(snapshot.score_id.as_deref(), Some(saved.score.id.as_str()));

        let repository = state.score_repository().await.unwrap();
        assert_eq!(repository.get_user_scores("u1").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_save_keeps_measurement() {
        let state = AppState::new(AppConfig::default());
        let id = settled_session(&state).await;

        assert!(matches!(
            save_score(&state, id, user()).await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_score_store(Arc::new(InMemoryScoreStore::new()))
            .await;
        assert!(save_score(&state, id, user()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn save_requires_settled_attempt() {
        let state = AppState::new(AppConfig::default());
        state
            .install_score_store(Arc::new(InMemoryScoreStore::new()))
            .await;
        let id = create_session(&state).await.id;
        assert!(matches!(
            save_score(&state, id, user()).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_and_deleted_sessions_are_not_found() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            get_session(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));

        let id = create_session(&state).await.id;
        start_attempt(&state, id).await.unwrap();
        delete_session(&state, id).await.unwrap();
        assert!(matches!(
            start_attempt(&state, id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(state.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_event_leaves_state_unchanged() {
        let state = AppState::new(AppConfig::default());
        let id = create_session(&state).await.id;

        assert!(matches!(
            respond(&state, id).await,
            Err(ServiceError::InvalidState(_))
        ));
        start_attempt(&state, id).await.unwrap();
        assert!(matches!(
            start_attempt(&state, id).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(get_session(&state, id).await.unwrap().phase, VisiblePhase::Armed);
    }
}
