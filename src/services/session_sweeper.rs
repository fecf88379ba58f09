use std::time::Duration;

use tokio::time::{Instant, interval};
use tracing::{debug, info};

use crate::state::SharedState;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically evict sessions idle for longer than the configured TTL.
pub async fn run(state: SharedState) {
    let ttl = state.config().session_ttl();
    let mut ticker = interval((ttl / 4).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL));

    loop {
        ticker.tick().await;
        let evicted = sweep(&state, Instant::now(), ttl).await;
        if evicted > 0 {
            info!(evicted, remaining = state.session_count(), "evicted idle sessions");
        }
    }
}

/// Remove every session whose last activity is older than `ttl` at `now`.
pub async fn sweep(state: &SharedState, now: Instant, ttl: Duration) -> usize {
    let mut evicted = 0;
    for session in state.sessions() {
        let idle = now.saturating_duration_since(session.last_activity().await);
        if idle < ttl {
            continue;
        }
        if let Some(session) = state.remove_session(session.id()) {
            session.shutdown().await;
            debug!(session_id = %session.id(), idle_secs = idle.as_secs(), "session evicted");
            evicted += 1;
        }
    }
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test(start_paused = true)]
    async fn evicts_only_idle_sessions() {
        let state = AppState::new(AppConfig::default());
        let ttl = Duration::from_secs(60);

        let stale = state.create_session();
        tokio::time::advance(Duration::from_secs(45)).await;
        let fresh = state.create_session();
        fresh.start_attempt().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(sweep(&state, Instant::now(), ttl).await, 1);
        assert!(state.session(stale.id()).is_err());
        assert!(state.session(fresh.id()).is_ok());
    }
}
