use std::{
    sync::{Arc, Weak},
    time::SystemTime,
};

use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::ScoreId,
    services::sse_events,
    state::{
        scheduler::{Scheduler, TimerHandle},
        sse::SseHub,
        timing_engine::{
            AttemptOutcome, DelayWindow, EngineSnapshot, Generation, InvalidTransition,
            TimingEngine, TimingPhase,
        },
    },
};

/// Whether the settled measurement of the current attempt was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing saved for this attempt.
    Unsaved,
    /// A save is in flight.
    Saving,
    /// Saved under the given identifier.
    Saved(ScoreId),
}

/// Errors raised by session operations on top of engine transition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The engine rejected the event.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Save requested while no measurement is settled.
    #[error("no settled measurement to save (phase {0:?})")]
    NothingToSave(TimingPhase),
    /// Another save of the same attempt is in flight.
    #[error("a save for this attempt is already in progress")]
    SaveInProgress,
    /// The attempt was already saved.
    #[error("this attempt was already saved as `{0}`")]
    AlreadySaved(ScoreId),
}

/// Ticket returned by [`TimingSession::begin_save`]; hand it back to
/// [`TimingSession::finish_save`] once the store answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    /// Attempt the measurement belongs to.
    pub generation: Generation,
    /// Reaction time in milliseconds.
    pub measurement: u64,
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Session identifier used in routes.
    pub id: Uuid,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
    /// Engine state at the time of the read.
    pub engine: EngineSnapshot,
    /// Whether the settled measurement was saved.
    pub save: SaveState,
}

struct SessionInner {
    engine: TimingEngine,
    timer: Option<TimerHandle>,
    save: SaveState,
    last_activity: Instant,
}

/// One game session: owns a timing engine, its single deferred timer, and the
/// SSE hub that tells the client when the stimulus goes live.
///
/// Every event, including the timer firing, goes through `inner`, which is
/// what serialises the engine.
pub struct TimingSession {
    id: Uuid,
    created_at: SystemTime,
    delay_window: DelayWindow,
    scheduler: Arc<dyn Scheduler>,
    events: SseHub,
    inner: Mutex<SessionInner>,
}

impl TimingSession {
    /// Create an idle session.
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        delay_window: DelayWindow,
        event_capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
            delay_window,
            scheduler,
            events: SseHub::new(event_capacity),
            inner: Mutex::new(SessionInner {
                engine: TimingEngine::new(),
                timer: None,
                save: SaveState::Unsaved,
                last_activity: Instant::now(),
            }),
        })
    }

    /// Identifier of the session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Broadcast hub carrying this session's phase changes.
    pub fn events(&self) -> &SseHub {
        &self.events
    }

    /// Snapshot the session.
    pub async fn view(&self) -> SessionView {
        let inner = self.inner.lock().await;
        self.view_of(&inner)
    }

    /// Time of the last user event.
    pub async fn last_activity(&self) -> Instant {
        self.inner.lock().await.last_activity
    }

    /// Start an attempt and schedule its stimulus timer.
    pub async fn start_attempt(self: &Arc<Self>) -> Result<SessionView, SessionError> {
        let mut inner = self.inner.lock().await;
        let delay = self.delay_window.sample(&mut rand::rng());
        let timer = inner.engine.start_attempt(now(), delay)?;

        // Settled attempts may leave a finished handle behind; anything still
        // pending here would break the single-timer invariant.
        if let Some(previous) = inner.timer.take() {
            previous.cancel();
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let generation = timer.generation;
        let handle = self.scheduler.schedule_once(
            timer.delay,
            Box::pin(async move {
                if let Some(session) = weak.upgrade() {
                    session.fire(generation).await;
                }
            }),
        );

        inner.timer = Some(handle);
        inner.save = SaveState::Unsaved;
        inner.last_activity = Instant::now();
        debug!(
            session_id = %self.id,
            generation,
            delay_ms = timer.delay.as_millis() as u64,
            "attempt armed"
        );

        let view = self.view_of(&inner);
        sse_events::broadcast_phase_changed(&self.events, &view);
        Ok(view)
    }

    /// Timer callback. Stale generations are ignored.
    async fn fire(&self, generation: Generation) {
        let mut inner = self.inner.lock().await;
        match inner.engine.fire(generation, now()) {
            Ok(()) => {
                inner.timer = None;
                debug!(session_id = %self.id, generation, "stimulus live");
                let view = self.view_of(&inner);
                sse_events::broadcast_phase_changed(&self.events, &view);
            }
            Err(stale) => {
                debug!(session_id = %self.id, error = %stale, "ignoring stale stimulus timer");
            }
        }
    }

    /// Register a user response.
    pub async fn respond(&self) -> Result<(AttemptOutcome, SessionView), SessionError> {
        let mut inner = self.inner.lock().await;
        // Read the clock only once the lock is held so it is never earlier than `live_at`.
        let outcome = inner.engine.respond(now())?;

        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        inner.last_activity = Instant::now();

        match outcome {
            AttemptOutcome::FalseStart => {
                info!(session_id = %self.id, "false start");
            }
            AttemptOutcome::Measurement(ms) => {
                info!(session_id = %self.id, reaction_ms = ms, "attempt settled");
            }
        }

        let view = self.view_of(&inner);
        sse_events::broadcast_phase_changed(&self.events, &view);
        Ok((outcome, view))
    }

    /// Return to idle, cancelling any pending timer.
    pub async fn reset(&self) -> SessionView {
        let mut inner = self.inner.lock().await;
        let cancelled = inner.engine.reset();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        inner.save = SaveState::Unsaved;
        inner.last_activity = Instant::now();
        if let Some(timer) = cancelled {
            debug!(session_id = %self.id, generation = timer.generation, "pending stimulus cancelled");
        }

        let view = self.view_of(&inner);
        sse_events::broadcast_phase_changed(&self.events, &view);
        view
    }

    /// Claim the settled measurement for persistence.
    pub async fn begin_save(&self) -> Result<SaveTicket, SessionError> {
        let mut inner = self.inner.lock().await;
        let Some(measurement) = inner.engine.measurement() else {
            return Err(SessionError::NothingToSave(inner.engine.phase()));
        };

        match &inner.save {
            SaveState::Saving => return Err(SessionError::SaveInProgress),
            SaveState::Saved(id) => return Err(SessionError::AlreadySaved(id.clone())),
            SaveState::Unsaved => {}
        }

        inner.save = SaveState::Saving;
        inner.last_activity = Instant::now();
        Ok(SaveTicket {
            generation: inner.engine.generation(),
            measurement,
        })
    }

    /// Record the result of a save started with [`begin_save`](Self::begin_save).
    ///
    /// `None` means the store failed and the attempt may be saved again. Results
    /// for an attempt that has since been reset or replaced are dropped.
    pub async fn finish_save(&self, ticket: SaveTicket, saved: Option<ScoreId>) {
        let mut inner = self.inner.lock().await;
        let same_attempt = inner.engine.generation() == ticket.generation
            && inner.engine.measurement().is_some()
            && inner.save == SaveState::Saving;
        if !same_attempt {
            debug!(
                session_id = %self.id,
                generation = ticket.generation,
                "save finished for an attempt that is no longer current"
            );
            return;
        }

        inner.save = match saved {
            Some(id) => SaveState::Saved(id),
            None => SaveState::Unsaved,
        };
    }

    /// Cancel the pending timer before the session is dropped.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.engine.reset();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
    }

    fn view_of(&self, inner: &SessionInner) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at,
            engine: inner.engine.snapshot(),
            save: inner.save.clone(),
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast::{Receiver, error::TryRecvError};

    use super::*;
    use crate::{dto::sse::ServerEvent, state::scheduler::TokioScheduler};

    fn fixed_delay(ms: u64) -> DelayWindow {
        DelayWindow::new(Duration::from_millis(ms), Duration::from_millis(ms + 1)).unwrap()
    }

    fn session(delay_ms: u64) -> Arc<TimingSession> {
        TimingSession::new(Arc::new(TokioScheduler), fixed_delay(delay_ms), 16)
    }

    async fn advance(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn drain_phases(rx: &mut Receiver<ServerEvent>) -> Vec<String> {
        let mut phases = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    let value: serde_json::Value = serde_json::from_str(&event.data).unwrap();
                    phases.push(value["phase"].as_str().unwrap().to_owned());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        phases
    }

    #[tokio::test(start_paused = true)]
    async fn goes_live_exactly_once_for_each_delay() {
        for delay in [1_000, 2_750, 4_999] {
            let session = session(delay);
            let mut rx = session.events().subscribe();

            session.start_attempt().await.unwrap();
            advance(delay - 1).await;
            assert_eq!(session.view().await.engine.phase, TimingPhase::Armed);

            advance(1).await;
            assert_eq!(session.view().await.engine.phase, TimingPhase::Live);

            advance(10_000).await;
            assert_eq!(drain_phases(&mut rx), vec!["armed", "live"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn false_start_cancels_the_stimulus() {
        let session = session(3_000);
        let mut rx = session.events().subscribe();

        session.start_attempt().await.unwrap();
        advance(1_200).await;
        let (outcome, view) = session.respond().await.unwrap();
        assert_eq!(outcome, AttemptOutcome::FalseStart);
        assert_eq!(view.engine.phase, TimingPhase::Idle);
        assert!(view.engine.pending.is_none());

        advance(10_000).await;
        assert_eq!(session.view().await.engine.phase, TimingPhase::Idle);
        assert_eq!(drain_phases(&mut rx), vec!["armed", "idle"]);
    }

    #[tokio::test(start_paused = true)]
    async fn measurement_equals_time_since_live() {
        let session = session(1_500);
        session.start_attempt().await.unwrap();
        advance(1_500).await;
        advance(264).await;

        let (outcome, view) = session.respond().await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Measurement(264));
        assert_eq!(view.engine.phase, TimingPhase::Settled);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_armed_prevents_live() {
        let session = session(2_000);
        session.start_attempt().await.unwrap();
        advance(1_999).await;

        let view = session.reset().await;
        assert_eq!(view.engine.phase, TimingPhase::Idle);
        assert!(view.engine.pending.is_none());
        assert!(view.engine.last_outcome.is_none());

        advance(5_000).await;
        assert_eq!(session.view().await.engine.phase, TimingPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_false_start_uses_fresh_timer() {
        let session = session(2_000);
        session.start_attempt().await.unwrap();
        advance(500).await;
        session.respond().await.unwrap();

        session.start_attempt().await.unwrap();
        // The first timer's deadline (t=2000) passes while the second is still armed.
        advance(1_600).await;
        assert_eq!(session.view().await.engine.phase, TimingPhase::Armed);

        advance(400).await;
        assert_eq!(session.view().await.engine.phase, TimingPhase::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn save_is_claimed_once_per_attempt() {
        let session = session(1_000);
        assert_eq!(
            session.begin_save().await,
            Err(SessionError::NothingToSave(TimingPhase::Idle))
        );

        session.start_attempt().await.unwrap();
        advance(1_000).await;
        advance(300).await;
        session.respond().await.unwrap();

        let ticket = session.begin_save().await.unwrap();
        assert_eq!(ticket.measurement, 300);
        assert_eq!(session.begin_save().await, Err(SessionError::SaveInProgress));

        session.finish_save(ticket, None).await;
        let ticket = session.begin_save().await.unwrap();
        session.finish_save(ticket, Some(ScoreId::new("s1"))).await;
        assert_eq!(
            session.begin_save().await,
            Err(SessionError::AlreadySaved(ScoreId::new("s1")))
        );

        session.start_attempt().await.unwrap();
        assert_eq!(session.view().await.save, SaveState::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn save_result_for_replaced_attempt_is_dropped() {
        let session = session(1_000);
        session.start_attempt().await.unwrap();
        advance(1_000).await;
        advance(150).await;
        session.respond().await.unwrap();

        let ticket = session.begin_save().await.unwrap();
        session.reset().await;
        session.finish_save(ticket, Some(ScoreId::new("late"))).await;
        assert_eq!(session.view().await.save, SaveState::Unsaved);
    }
}
