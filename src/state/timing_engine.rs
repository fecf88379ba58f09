use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;

/// Phases a single reaction-time attempt moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingPhase {
    /// No attempt in progress.
    Idle,
    /// Attempt started, stimulus not visible yet; one deferred timer is pending.
    Armed,
    /// Stimulus visible, engine is timing.
    Live,
    /// Attempt finished with a measurement.
    Settled,
}

/// Result of the latest attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The user responded before the stimulus became visible.
    FalseStart,
    /// Reaction time in milliseconds.
    Measurement(u64),
}

/// User events the engine can reject. Timer fires and resets never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingEvent {
    /// User asks for a new attempt.
    StartAttempt,
    /// User clicked / pressed.
    Respond,
}

/// Monotonic counter identifying each scheduled stimulus timer.
pub type Generation = u64;

/// Deferred transition the caller must schedule after [`TimingEngine::start_attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    /// Identifier to hand back to [`TimingEngine::fire`].
    pub generation: Generation,
    /// How long to wait before firing.
    pub delay: Duration,
}

/// Error returned when an event is not valid in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the engine was in when the event was received.
    pub from: TimingPhase,
    /// The rejected event.
    pub event: TimingEvent,
}

/// A timer fired after it was cancelled or superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stale stimulus timer {fired} (pending: {pending:?})")]
pub struct StaleTimer {
    /// Generation carried by the timer that fired.
    pub fired: Generation,
    /// Generation currently pending, if any.
    pub pending: Option<Generation>,
}

/// Half-open window `[min, max)` the Armed→Live delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    /// Create a window, rejecting empty ranges.
    pub fn new(min: Duration, max: Duration) -> Option<Self> {
        (min < max).then_some(Self { min, max })
    }

    /// Lower bound (inclusive).
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound (exclusive).
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw a delay uniformly from the window with millisecond granularity.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rng.random_range(min..max))
    }
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1_000),
            max: Duration::from_millis(5_000),
        }
    }
}

/// Read-only view of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Current phase.
    pub phase: TimingPhase,
    /// Outcome of the latest attempt, if any.
    pub last_outcome: Option<AttemptOutcome>,
    /// Generation of the attempt currently held (armed, live or settled).
    pub generation: Generation,
    /// Pending timer, present only while armed.
    pub pending: Option<ArmedTimer>,
}

/// Reaction-time state machine.
///
/// The engine is pure: callers pass the clock reading for every event and are
/// responsible for scheduling the [`ArmedTimer`] returned by
/// [`start_attempt`](Self::start_attempt). A fire is only honoured when its
/// generation matches the pending timer, so a timer that slipped past
/// cancellation can never produce a second or late `Live` transition.
#[derive(Debug, Clone)]
pub struct TimingEngine {
    phase: TimingPhase,
    generation: Generation,
    pending: Option<ArmedTimer>,
    armed_at: Option<Instant>,
    live_at: Option<Instant>,
    last_outcome: Option<AttemptOutcome>,
}

impl Default for TimingEngine {
    fn default() -> Self {
        Self {
            phase: TimingPhase::Idle,
            generation: 0,
            pending: None,
            armed_at: None,
            live_at: None,
            last_outcome: None,
        }
    }
}

impl TimingEngine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> TimingPhase {
        self.phase
    }

    /// Outcome of the latest attempt.
    pub fn last_outcome(&self) -> Option<AttemptOutcome> {
        self.last_outcome
    }

    /// Timer that must fire to go live, present only while armed.
    pub fn pending_timer(&self) -> Option<ArmedTimer> {
        self.pending
    }

    /// Generation of the most recent attempt.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Clock reading taken when the current attempt was armed.
    pub fn armed_at(&self) -> Option<Instant> {
        self.armed_at
    }

    /// Clock reading taken when the stimulus went live.
    pub fn live_at(&self) -> Option<Instant> {
        self.live_at
    }

    /// Measurement of the settled attempt, if any.
    pub fn measurement(&self) -> Option<u64> {
        match (self.phase, self.last_outcome) {
            (TimingPhase::Settled, Some(AttemptOutcome::Measurement(ms))) => Some(ms),
            _ => None,
        }
    }

    /// Create a snapshot of the engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            phase: self.phase,
            last_outcome: self.last_outcome,
            generation: self.generation,
            pending: self.pending,
        }
    }

    /// Begin an attempt. Valid from `Idle` and `Settled` (implicit reset).
    ///
    /// Returns the single timer the caller has to schedule.
    pub fn start_attempt(
        &mut self,
        now: Instant,
        delay: Duration,
    ) -> Result<ArmedTimer, InvalidTransition> {
        match self.phase {
            TimingPhase::Idle | TimingPhase::Settled => {}
            from => {
                return Err(InvalidTransition {
                    from,
                    event: TimingEvent::StartAttempt,
                });
            }
        }

        self.generation += 1;
        let timer = ArmedTimer {
            generation: self.generation,
            delay,
        };

        self.phase = TimingPhase::Armed;
        self.pending = Some(timer);
        self.armed_at = Some(now);
        self.live_at = None;
        self.last_outcome = None;

        Ok(timer)
    }

    /// Apply the deferred timer. Only the pending generation moves `Armed` to `Live`.
    pub fn fire(&mut self, generation: Generation, now: Instant) -> Result<(), StaleTimer> {
        match self.pending {
            Some(timer) if self.phase == TimingPhase::Armed && timer.generation == generation => {
                self.pending = None;
                self.live_at = Some(now);
                self.phase = TimingPhase::Live;
                Ok(())
            }
            pending => Err(StaleTimer {
                fired: generation,
                pending: pending.map(|timer| timer.generation),
            }),
        }
    }

    /// Register a user response.
    ///
    /// While armed this cancels the pending timer and yields a false start;
    /// while live it settles the attempt with `now - live_at`.
    pub fn respond(&mut self, now: Instant) -> Result<AttemptOutcome, InvalidTransition> {
        let outcome = match self.phase {
            TimingPhase::Armed => {
                self.pending = None;
                self.armed_at = None;
                self.phase = TimingPhase::Idle;
                AttemptOutcome::FalseStart
            }
            TimingPhase::Live => {
                let live_at = self.live_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(live_at);
                self.phase = TimingPhase::Settled;
                AttemptOutcome::Measurement(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            }
            from => {
                return Err(InvalidTransition {
                    from,
                    event: TimingEvent::Respond,
                });
            }
        };

        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Return to idle from any phase, dropping the pending timer and the outcome.
    ///
    /// Returns the timer that was cancelled, if one was pending.
    pub fn reset(&mut self) -> Option<ArmedTimer> {
        let cancelled = self.pending.take();
        self.phase = TimingPhase::Idle;
        self.armed_at = None;
        self.live_at = None;
        self.last_outcome = None;
        cancelled
    }
}
