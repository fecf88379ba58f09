pub mod scheduler;
pub mod session;
mod sse;
pub mod timing_engine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig, dao::score_store::ScoreStore, error::ServiceError,
    services::score_repository::ScoreRepository,
};

pub use self::sse::SseHub;
use self::{
    scheduler::{Scheduler, TokioScheduler},
    session::TimingSession,
};

pub type SharedState = Arc<AppState>;

/// Central application state: the score store handle, live game sessions and
/// the degraded-mode flag.
pub struct AppState {
    config: AppConfig,
    score_store: RwLock<Option<Arc<dyn ScoreStore>>>,
    sessions: DashMap<Uuid, Arc<TimingSession>>,
    scheduler: Arc<dyn Scheduler>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_scheduler(config, Arc::new(TokioScheduler))
    }

    /// Same as [`AppState::new`] with a custom timer scheduler.
    pub fn with_scheduler(config: AppConfig, scheduler: Arc<dyn Scheduler>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            score_store: RwLock::new(None),
            sessions: DashMap::new(),
            scheduler,
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current score store, if one is installed.
    pub async fn score_store(&self) -> Option<Arc<dyn ScoreStore>> {
        let guard = self.score_store.read().await;
        guard.as_ref().cloned()
    }

    /// Like [`score_store`](Self::score_store) but fails with [`ServiceError::Degraded`].
    pub async fn require_score_store(&self) -> Result<Arc<dyn ScoreStore>, ServiceError> {
        self.score_store().await.ok_or(ServiceError::Degraded)
    }

    /// Score repository over the installed store.
    pub async fn score_repository(&self) -> Result<ScoreRepository, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        let store = self.require_score_store().await?;
        Ok(ScoreRepository::new(store))
    }

    /// Install a new score store implementation and leave degraded mode.
    pub async fn install_score_store(&self, store: Arc<dyn ScoreStore>) {
        {
            let mut guard = self.score_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current score store and enter degraded mode.
    pub async fn clear_score_store(&self) {
        {
            let mut guard = self.score_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        if self.score_store.read().await.is_none() {
            return true;
        }
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Create and register a fresh idle session.
    pub fn create_session(&self) -> Arc<TimingSession> {
        let session = TimingSession::new(
            self.scheduler.clone(),
            self.config.delay_window(),
            self.config.session_event_capacity(),
        );
        self.sessions.insert(session.id(), session.clone());
        session
    }

    /// Look up a session by id.
    pub fn session(&self, id: Uuid) -> Result<Arc<TimingSession>, ServiceError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("session `{id}` not found")))
    }

    /// Unregister a session, returning it when it existed.
    pub fn remove_session(&self, id: Uuid) -> Option<Arc<TimingSession>> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Arc<TimingSession>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
