//! Process configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use arena_core::EventWindow;

use crate::batch::{BackoffRetrier, BatchConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the binaries need, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub window: EventWindow,
    pub score_refresh: Duration,
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub server_port: u16,
    pub leaderboard_path: PathBuf,
    /// Command prefix for the command-line ledger; `None` selects the in-memory ledger.
    pub ledger_command: Option<String>,
    pub retry_interval: Duration,
    pub retry_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let start = get("ROUND_START_TIMESTAMP").ok_or(ConfigError::Missing("ROUND_START_TIMESTAMP"))?;
        let end = get("ROUND_END_TIMESTAMP").ok_or(ConfigError::Missing("ROUND_END_TIMESTAMP"))?;
        let window = EventWindow::parse_rfc3339(&start, &end).map_err(|e| ConfigError::Invalid {
            name: "ROUND_START_TIMESTAMP/ROUND_END_TIMESTAMP",
            reason: e.to_string(),
        })?;

        let score_refresh_secs: u64 = parse_or("SCORE_REFRESH_SECS", get("SCORE_REFRESH_SECS"), 180)?;
        if score_refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SCORE_REFRESH_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let batch_size: usize = parse_or("BATCH_AMT", get("BATCH_AMT"), 50)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_AMT",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            window,
            score_refresh: Duration::from_secs(score_refresh_secs),
            batch_size,
            inter_batch_delay: Duration::from_millis(parse_or("SLEEP_MS", get("SLEEP_MS"), 5_000)?),
            server_port: parse_or("AL_SERVER_PORT", get("AL_SERVER_PORT"), 8080)?,
            leaderboard_path: get("LEADERBOARD_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/leaderboard.json")),
            ledger_command: get("LEDGER_COMMAND"),
            retry_interval: Duration::from_millis(parse_or("RETRY_INTERVAL_MS", get("RETRY_INTERVAL_MS"), 3_000)?),
            retry_attempts: parse_or("RETRY_ATTEMPTS", get("RETRY_ATTEMPTS"), 10)?,
        })
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig::new(self.batch_size, self.inter_batch_delay)
    }

    pub fn retrier(&self) -> BackoffRetrier {
        BackoffRetrier::new(self.retry_interval, self.retry_attempts)
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    const WINDOW: [(&str, &str); 2] = [
        ("ROUND_START_TIMESTAMP", "2026-03-01T12:00:00Z"),
        ("ROUND_END_TIMESTAMP", "2026-03-01T18:00:00Z"),
    ];

    #[test]
    fn defaults_apply_when_only_window_is_set() {
        let cfg = config(&WINDOW).unwrap();

        assert_eq!(cfg.score_refresh, Duration::from_secs(180));
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.inter_batch_delay, Duration::from_millis(5_000));
        assert_eq!(cfg.server_port, 8080);
        assert_eq!(cfg.leaderboard_path, PathBuf::from("data/leaderboard.json"));
        assert_eq!(cfg.ledger_command, None);
        assert_eq!(cfg.retrier(), BackoffRetrier::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = WINDOW.to_vec();
        vars.extend([
            ("BATCH_AMT", "20"),
            ("SLEEP_MS", "250"),
            ("AL_SERVER_PORT", "9000"),
            ("LEDGER_COMMAND", "npx hardhat"),
            ("RETRY_ATTEMPTS", "4"),
        ]);

        let cfg = config(&vars).unwrap();

        assert_eq!(cfg.batch_config(), BatchConfig::new(20, Duration::from_millis(250)));
        assert_eq!(cfg.server_port, 9000);
        assert_eq!(cfg.ledger_command.as_deref(), Some("npx hardhat"));
        assert_eq!(cfg.retrier().max_attempts(), 4);
    }

    #[test]
    fn missing_window_is_fatal() {
        assert_eq!(
            config(&[("ROUND_END_TIMESTAMP", "2026-03-01T18:00:00Z")]).unwrap_err(),
            ConfigError::Missing("ROUND_START_TIMESTAMP")
        );
    }

    #[test]
    fn inverted_window_is_fatal() {
        let err = config(&[
            ("ROUND_START_TIMESTAMP", "2026-03-01T18:00:00Z"),
            ("ROUND_END_TIMESTAMP", "2026-03-01T12:00:00Z"),
        ])
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_chunk_size_and_refresh_are_rejected() {
        let mut vars = WINDOW.to_vec();
        vars.push(("BATCH_AMT", "0"));
        assert!(matches!(config(&vars), Err(ConfigError::Invalid { name: "BATCH_AMT", .. })));

        let mut vars = WINDOW.to_vec();
        vars.push(("SCORE_REFRESH_SECS", "0"));
        assert!(matches!(
            config(&vars),
            Err(ConfigError::Invalid { name: "SCORE_REFRESH_SECS", .. })
        ));
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let mut vars = WINDOW.to_vec();
        vars.push(("AL_SERVER_PORT", "eighty"));
        assert!(matches!(config(&vars), Err(ConfigError::Invalid { name: "AL_SERVER_PORT", .. })));
    }
}
