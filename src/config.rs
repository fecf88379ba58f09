//! Application-level configuration loading: stimulus delay window, leaderboard
//! limits and session lifetime.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{dao::models::REACTION_TIME_GAME_TYPE, state::timing_engine::DelayWindow};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "REFLEX_BACK_CONFIG_PATH";

const DEFAULT_TOP_LIMIT: usize = 10;
const DEFAULT_MAX_TOP_LIMIT: usize = 100;
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_SESSION_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    delay_window: DelayWindow,
    default_top_limit: usize,
    max_top_limit: usize,
    game_type: String,
    session_ttl: Duration,
    session_event_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        delay_min_ms = app_config.delay_window.min().as_millis() as u64,
                        delay_max_ms = app_config.delay_window.max().as_millis() as u64,
                        game_type = %app_config.game_type,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Window the Armed→Live delay is drawn from.
    pub fn delay_window(&self) -> DelayWindow {
        self.delay_window
    }

    /// Leaderboard size used when the client does not ask for one.
    pub fn default_top_limit(&self) -> usize {
        self.default_top_limit
    }

    /// Largest leaderboard size the HTTP layer accepts.
    pub fn max_top_limit(&self) -> usize {
        self.max_top_limit
    }

    /// Discriminator stored with every score.
    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    /// Idle time after which a session is evicted.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Broadcast capacity of each session's event hub.
    pub fn session_event_capacity(&self) -> usize {
        self.session_event_capacity
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            delay_window: DelayWindow::default(),
            default_top_limit: DEFAULT_TOP_LIMIT,
            max_top_limit: DEFAULT_MAX_TOP_LIMIT,
            game_type: REACTION_TIME_GAME_TYPE.to_owned(),
            session_ttl: DEFAULT_SESSION_TTL,
            session_event_capacity: DEFAULT_SESSION_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
/// Every key is optional.
struct RawConfig {
    #[serde(default)]
    stimulus_delay_ms: Option<RawDelayWindow>,
    #[serde(default)]
    leaderboard: Option<RawLeaderboard>,
    #[serde(default)]
    game_type: Option<String>,
    #[serde(default)]
    session_ttl_secs: Option<u64>,
    #[serde(default)]
    session_event_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDelayWindow {
    min: u64,
    max: u64,
}

#[derive(Debug, Deserialize)]
struct RawLeaderboard {
    #[serde(default)]
    default_limit: Option<usize>,
    #[serde(default)]
    max_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();

        let delay_window = match value.stimulus_delay_ms {
            Some(raw) => DelayWindow::new(
                Duration::from_millis(raw.min),
                Duration::from_millis(raw.max),
            )
            .unwrap_or_else(|| {
                warn!(
                    min_ms = raw.min,
                    max_ms = raw.max,
                    "invalid stimulus delay window; using default"
                );
                defaults.delay_window
            }),
            None => defaults.delay_window,
        };

        let max_top_limit = value
            .leaderboard
            .as_ref()
            .and_then(|raw| raw.max_limit)
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults.max_top_limit);
        let default_top_limit = value
            .leaderboard
            .as_ref()
            .and_then(|raw| raw.default_limit)
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults.default_top_limit)
            .min(max_top_limit);

        let game_type = value
            .game_type
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.game_type);

        Self {
            delay_window,
            default_top_limit,
            max_top_limit,
            game_type,
            session_ttl: value
                .session_ttl_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            session_event_capacity: value
                .session_event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.session_event_capacity),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str::<RawConfig>(json).unwrap().into()
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse("{}");
        assert_eq!(config.delay_window(), DelayWindow::default());
        assert_eq!(config.default_top_limit(), 10);
        assert_eq!(config.max_top_limit(), 100);
        assert_eq!(config.game_type(), REACTION_TIME_GAME_TYPE);
        assert_eq!(config.session_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn reads_every_key() {
        let config = parse(
            r#"{
                "stimulus_delay_ms": { "min": 500, "max": 1500 },
                "leaderboard": { "default_limit": 5, "max_limit": 20 },
                "game_type": "reaction-time-v2",
                "session_ttl_secs": 60,
                "session_event_capacity": 4
            }"#,
        );
        assert_eq!(config.delay_window().min(), Duration::from_millis(500));
        assert_eq!(config.delay_window().max(), Duration::from_millis(1500));
        assert_eq!(config.default_top_limit(), 5);
        assert_eq!(config.max_top_limit(), 20);
        assert_eq!(config.game_type(), "reaction-time-v2");
        assert_eq!(config.session_ttl(), Duration::from_secs(60));
        assert_eq!(config.session_event_capacity(), 4);
    }

    #[test]
    fn inverted_delay_window_falls_back() {
        let config = parse(r#"{ "stimulus_delay_ms": { "min": 4000, "max": 1000 } }"#);
        assert_eq!(config.delay_window(), DelayWindow::default());
    }

    #[test]
    fn default_limit_is_capped_by_max() {
        let config = parse(r#"{ "leaderboard": { "default_limit": 50, "max_limit": 25 } }"#);
        assert_eq!(config.default_top_limit(), 25);
    }
}
