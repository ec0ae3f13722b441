//! services/reminderd/src/config.rs
//!
//! Defines the daemon's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

use crate::engine::poller::{PollerSettings, ScanScope};
use crate::engine::alert::AlertSettings;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub log_level: Level,
    pub poll_interval: Duration,
    pub replay_pad: Duration,
    pub store_timeout: Duration,
    /// `None` keeps an alert up until the user dismisses it.
    pub alert_timeout: Option<Duration>,
    pub scan_scope: ScanScope,
    pub skip_missed: bool,
    pub openai_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub player_backend: PlayerBackend,
    pub player_command: String,
}

/// How announcement clips reach the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerBackend {
    /// Hand each clip to an external player program.
    Command,
    /// Render in-process through cpal (`cpal-playback` feature).
    Cpal,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://reminders.db".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Scheduling ---
        let poll_interval = positive_secs(&lookup, "POLL_INTERVAL_SECS", 5)?;
        let replay_pad = Duration::from_secs(secs(&lookup, "REPLAY_PAD_SECS", 3)?);
        let store_timeout = positive_secs(&lookup, "STORE_TIMEOUT_SECS", 5)?;
        let alert_timeout = match secs(&lookup, "ALERT_TIMEOUT_SECS", 0)? {
            0 => None,
            n => Some(Duration::from_secs(n)),
        };

        let scan_scope = match lookup("SCAN_SCOPE") {
            None => ScanScope::All,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "all" => ScanScope::All,
                "today" => ScanScope::Today,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "SCAN_SCOPE".to_string(),
                        format!("'{}' is not one of: all, today", raw),
                    ))
                }
            },
        };

        let skip_missed = match lookup("SKIP_MISSED") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::InvalidValue("SKIP_MISSED".to_string(), format!("'{}' is not a boolean", raw))
            })?,
        };

        // --- Speech and playback ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let tts_model = lookup("TTS_MODEL").unwrap_or_else(|| "tts-1".to_string());
        let tts_voice = lookup("TTS_VOICE").unwrap_or_else(|| "alloy".to_string());
        let player_backend = match lookup("PLAYER_BACKEND") {
            None => PlayerBackend::Command,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "command" => PlayerBackend::Command,
                "cpal" => PlayerBackend::Cpal,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "PLAYER_BACKEND".to_string(),
                        format!("'{}' is not one of: command, cpal", raw),
                    ))
                }
            },
        };
        let player_command = lookup("PLAYER_COMMAND").unwrap_or_else(|| default_player().to_string());
        if player_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "PLAYER_COMMAND".to_string(),
                "must not be empty".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            log_level,
            poll_interval,
            replay_pad,
            store_timeout,
            alert_timeout,
            scan_scope,
            skip_missed,
            openai_api_key,
            tts_model,
            tts_voice,
            player_backend,
            player_command,
        })
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            interval: self.poll_interval,
            store_timeout: self.store_timeout,
            scan_scope: self.scan_scope,
            skip_missed: self.skip_missed,
        }
    }

    pub fn alert_settings(&self) -> AlertSettings {
        AlertSettings {
            replay_pad: self.replay_pad,
            max_duration: self.alert_timeout,
        }
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn positive_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match secs(lookup, key, default)? {
        0 => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        n => Ok(Duration::from_secs(n)),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_player() -> &'static str {
    if cfg!(target_os = "macos") {
        "afplay"
    } else {
        "aplay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite://reminders.db");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.replay_pad, Duration::from_secs(3));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.alert_timeout, None);
        assert_eq!(config.scan_scope, ScanScope::All);
        assert!(!config.skip_missed);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.tts_voice, "alloy");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("POLL_INTERVAL_SECS", "1"),
            ("ALERT_TIMEOUT_SECS", "600"),
            ("SCAN_SCOPE", "Today"),
            ("SKIP_MISSED", "yes"),
            ("OPENAI_API_KEY", "sk-test"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.alert_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.scan_scope, ScanScope::Today);
        assert!(config.skip_missed);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = config_from(&[("POLL_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "POLL_INTERVAL_SECS"));
    }

    #[test]
    fn rejects_unknown_scan_scope() {
        assert!(config_from(&[("SCAN_SCOPE", "week")]).is_err());
    }

    #[test]
    fn selects_the_player_backend() {
        assert_eq!(config_from(&[]).unwrap().player_backend, PlayerBackend::Command);
        let config = config_from(&[("PLAYER_BACKEND", "CPAL")]).unwrap();
        assert_eq!(config.player_backend, PlayerBackend::Cpal);
        assert!(config_from(&[("PLAYER_BACKEND", "speaker")]).is_err());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.openai_api_key.is_none());
    }
}
