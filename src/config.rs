//! Application-level configuration loading: sync policy and seed data location.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::sync::SyncPolicy;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GOLF_LEAGUE_CONFIG_PATH";

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    sync: SyncPolicy,
    seed_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_attempts = app_config.sync.max_attempts,
                        seeded = app_config.seed_path.is_some(),
                        "loaded config"
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

    /// Retry and polling policy handed to every score sync session.
    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync
    }

    /// JSON file the in-memory store is seeded from, if any.
    pub fn seed_path(&self) -> Option<&PathBuf> {
        self.seed_path.as_ref()
    }

    /// Replace the sync policy, mostly for tests that need short delays.
    pub fn with_sync_policy(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    sync: RawSyncPolicy,
    #[serde(default)]
    seed_path: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            sync: value.sync.into(),
            seed_path: value.seed_path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// Sync policy as written in the file; absent keys keep their default.
struct RawSyncPolicy {
    max_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    poll_interval_min_secs: Option<u64>,
    poll_interval_max_secs: Option<u64>,
    saved_linger_ms: Option<u64>,
}

impl From<RawSyncPolicy> for SyncPolicy {
    fn from(value: RawSyncPolicy) -> Self {
        let defaults = SyncPolicy::default();
        Self {
            max_attempts: value.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            retry_delay: value
                .retry_delay_ms
                .map_or(defaults.retry_delay, Duration::from_millis),
            request_timeout: value
                .request_timeout_ms
                .map_or(defaults.request_timeout, Duration::from_millis),
            poll_interval_min: value
                .poll_interval_min_secs
                .map_or(defaults.poll_interval_min, Duration::from_secs),
            poll_interval_max: value
                .poll_interval_max_secs
                .map_or(defaults.poll_interval_max, Duration::from_secs),
            saved_linger: value
                .saved_linger_ms
                .map_or(defaults.saved_linger, Duration::from_millis),
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

    #[test]
    fn partial_sync_section_keeps_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "sync": { "max_attempts": 5, "retry_delay_ms": 500 } }"#)
                .unwrap();
        let config = AppConfig::from(raw);

        let policy = config.sync_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_delay, Duration::from_millis(500));
        assert_eq!(policy.request_timeout, Duration::from_secs(8));
        assert!(config.seed_path().is_none());
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let raw: RawConfig = serde_json::from_str(r#"{ "sync": { "max_attempts": 0 } }"#).unwrap();
        assert_eq!(AppConfig::from(raw).sync_policy().max_attempts, 1);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.sync_policy(), SyncPolicy::default());
    }
}
