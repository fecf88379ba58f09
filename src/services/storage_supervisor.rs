use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{score_store::ScoreStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the score store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ScoreStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_score_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !watch_store(&state, store.as_ref()).await {
                    warn!("exhausted storage reconnect attempts; dropping the store");
                    state.clear_score_store().await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it stays unreachable through every reconnect attempt.
async fn watch_store(state: &SharedState, store: &dyn ScoreStore) -> bool {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    return false;
                }
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn ScoreStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, Ordering},
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{NewScoreEntity, ScoreEntity, ScoreId},
            score_store::memory::InMemoryScoreStore,
            storage::StorageResult,
        },
        state::AppState,
    };

    /// Memory store whose health can be switched off.
    #[derive(Clone, Default)]
    struct FlakyStore {
        inner: InMemoryScoreStore,
        down: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
            let down = self.down.load(Ordering::SeqCst);
            Box::pin(async move {
                if down {
                    Err(StorageError::unavailable(
                        "probe failed".into(),
                        io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
                    ))
                } else {
                    Ok(())
                }
            })
        }
    }

    impl ScoreStore for FlakyStore {
        fn insert_score(&self, score: NewScoreEntity) -> BoxFuture<'static, StorageResult<ScoreId>> {
            self.inner.insert_score(score)
        }
        fn top_scores(&self, limit: usize) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
            self.inner.top_scores(limit)
        }
        fn user_scores(&self, user_id: String) -> BoxFuture<'static, StorageResult<Vec<ScoreEntity>>> {
            self.inner.user_scores(user_id)
        }
        fn user_best(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<ScoreEntity>>> {
            self.inner.user_best(user_id)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.probe()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.probe()
        }
    }

    async fn settle(duration: Duration) {
        tokio::time::advance(duration).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_degraded_mode_with_store_health() {
        let state = AppState::new(AppConfig::default());
        let store = FlakyStore::default();
        let down = store.down.clone();

        let connect_store = store.clone();
        tokio::spawn(run(state.clone(), move || {
            let store: Arc<dyn ScoreStore> = Arc::new(connect_store.clone());
            async move { Ok::<_, StorageError>(store) }
        }));

        settle(Duration::from_millis(10)).await;
        assert!(!state.is_degraded().await);

        down.store(true, Ordering::SeqCst);
        settle(HEALTH_POLL_INTERVAL).await;
        assert!(state.is_degraded().await);

        down.store(false, Ordering::SeqCst);
        settle(INITIAL_DELAY).await;
        assert!(!state.is_degraded().await);
    }
}
