use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// How long to keep pinging a fresh client before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ConnectRetry {
    pub max_attempts: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            first_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ConnectRetry {
    /// Pause before the ping following failed attempt number `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.first_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Open a client for the score database and wait until the server answers a ping.
pub(super) async fn establish_connection(
    config: &MongoConfig,
    retry: ConnectRetry,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(source) if attempt >= retry.max_attempts => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                let delay = retry.delay_after(attempt);
                debug!(
                    database = %config.database_name,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "score database ping failed"
                );
                sleep(delay).await;
            }
        }
    }

    info!(database = %config.database_name, attempts = attempt, "score database reachable");
    Ok((client, database))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        let retry = ConnectRetry::default();
        let delays: Vec<u64> = (1..=7)
            .map(|attempt| retry.delay_after(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![250, 500, 1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn huge_attempt_counts_stay_capped() {
        let retry = ConnectRetry::default();
        assert_eq!(retry.delay_after(u32::MAX), retry.max_delay);
    }
}
