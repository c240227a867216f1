//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables of the ranking core with production defaults.
//! - Overlay values from `POSTRANK_*` environment variables.
//!
//! # Invariants
//! - A validated config has a positive window, a positive finite
//!   score-per-vote, and a non-empty key prefix.

use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Seven days.
pub const DEFAULT_VOTE_WINDOW_SECS: i64 = 7 * 24 * 3600;
/// 86400 / 200: two hundred up-votes buy one extra day of ranking.
pub const DEFAULT_SCORE_PER_VOTE: f64 = 432.0;
pub const DEFAULT_KEY_PREFIX: &str = "postrank:";
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 8;

const ENV_VOTE_WINDOW_SECS: &str = "POSTRANK_VOTE_WINDOW_SECS";
const ENV_SCORE_PER_VOTE: &str = "POSTRANK_SCORE_PER_VOTE";
const ENV_KEY_PREFIX: &str = "POSTRANK_KEY_PREFIX";
const ENV_MAX_CONFLICT_RETRIES: &str = "POSTRANK_MAX_CONFLICT_RETRIES";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, message } => write!(f, "invalid `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub vote_window_secs: i64,
    pub score_per_vote: f64,
    pub key_prefix: String,
    /// Re-executions allowed after an optimistic-lock conflict.
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vote_window_secs: DEFAULT_VOTE_WINDOW_SECS,
            score_per_vote: DEFAULT_SCORE_PER_VOTE,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Loads defaults overridden by process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by `lookup`; used by `from_env` and tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let defaults = Self::default();
        let config = Self {
            vote_window_secs: load(&lookup, ENV_VOTE_WINDOW_SECS, defaults.vote_window_secs)?,
            score_per_vote: load(&lookup, ENV_SCORE_PER_VOTE, defaults.score_per_vote)?,
            key_prefix: load(&lookup, ENV_KEY_PREFIX, defaults.key_prefix)?,
            max_conflict_retries: load(
                &lookup,
                ENV_MAX_CONFLICT_RETRIES,
                defaults.max_conflict_retries,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.vote_window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "vote_window_secs",
                message: format!("must be positive, got {}", self.vote_window_secs),
            });
        }
        if !self.score_per_vote.is_finite() || self.score_per_vote <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "score_per_vote",
                message: format!("must be positive and finite, got {}", self.score_per_vote),
            });
        }
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "key_prefix",
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> ConfigResult<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key,
            message: format!("`{raw}`: {err}"),
        }),
        None => {
            info!("event=config_load module=config status=default key={key} value={default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, DEFAULT_SCORE_PER_VOTE, DEFAULT_VOTE_WINDOW_SECS};
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_one_week_and_432_points() {
        let config = EngineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.vote_window_secs, DEFAULT_VOTE_WINDOW_SECS);
        assert_eq!(config.vote_window_secs, 604_800);
        assert_eq!(config.score_per_vote, DEFAULT_SCORE_PER_VOTE);
        assert_eq!(config.key_prefix, "postrank:");
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("POSTRANK_VOTE_WINDOW_SECS", "60"),
            ("POSTRANK_KEY_PREFIX", "test:"),
        ]))
        .unwrap();
        assert_eq!(config.vote_window_secs, 60);
        assert_eq!(config.key_prefix, "test:");
    }

    #[test]
    fn unparsable_or_invalid_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup_from(&[("POSTRANK_SCORE_PER_VOTE", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == "POSTRANK_SCORE_PER_VOTE"
        ));

        let err = EngineConfig::from_lookup(lookup_from(&[("POSTRANK_VOTE_WINDOW_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "vote_window_secs"));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"score_per_vote": 10.0}"#).unwrap();
        assert_eq!(config.score_per_vote, 10.0);
        assert_eq!(config.vote_window_secs, 604_800);
    }
}
