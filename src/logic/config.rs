//! Configuration module
//!
//! One `Config` is built at startup (defaults, then environment, then CLI
//! flags) and handed to the components that need it. Nothing reads the
//! environment after that.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{
    default_alert_db_path, default_model_path, DEFAULT_RECENT_LIMIT, DEFAULT_THRESHOLD,
    ENV_ALERT_DB_PATH, ENV_MODEL_PATH, ENV_RECENT_LIMIT, ENV_THRESHOLD,
};
use crate::logic::error::{Result, SentinelError};
use crate::logic::model::TrainingConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Model artifact (autoencoder + scaler)
    pub model_path: PathBuf,

    /// SQLite alert database
    pub alert_db_path: PathBuf,

    /// Alert when score > threshold
    pub threshold: f64,

    /// Default row count for recent-alert queries
    pub recent_limit: usize,

    pub training: TrainingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            alert_db_path: default_alert_db_path(),
            threshold: DEFAULT_THRESHOLD,
            recent_limit: DEFAULT_RECENT_LIMIT,
            training: TrainingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            model_path: lookup(ENV_MODEL_PATH)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            alert_db_path: lookup(ENV_ALERT_DB_PATH)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.alert_db_path),

            threshold: finite_or_default(parse_or(&lookup, ENV_THRESHOLD, defaults.threshold)),

            recent_limit: parse_or(&lookup, ENV_RECENT_LIMIT, defaults.recent_limit),

            training: defaults.training,
        }
    }

    /// Checks that do not depend on the filesystem
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(SentinelError::Input(format!(
                "threshold must be a finite non-negative number, got {}",
                self.threshold
            )));
        }
        self.training.validate()
    }
}

/// Parse a variable, warning and falling back when it is malformed
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring {}={:?}, using {}", key, raw, default);
                default
            }
        },
    }
}

fn finite_or_default(threshold: f64) -> f64 {
    if threshold.is_finite() {
        threshold
    } else {
        log::warn!("{} must be finite, using {}", ENV_THRESHOLD, DEFAULT_THRESHOLD);
        DEFAULT_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.threshold, 0.01);
        assert_eq!(config.recent_limit, 50);
        assert!(config.model_path.ends_with("model.json"));
        assert!(config.alert_db_path.ends_with("alerts.db"));
        assert_eq!(config.training.epochs, 40);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MODEL_PATH", "/tmp/m.json"),
            ("ALERT_DB_PATH", "/tmp/a.db"),
            ("ANOMALY_THRESHOLD", "0.25"),
            ("RECENT_ALERT_LIMIT", "10"),
        ]));

        assert_eq!(config.model_path, PathBuf::from("/tmp/m.json"));
        assert_eq!(config.alert_db_path, PathBuf::from("/tmp/a.db"));
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.recent_limit, 10);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("ANOMALY_THRESHOLD", "high"),
            ("RECENT_ALERT_LIMIT", "-3"),
            ("MODEL_PATH", "  "),
        ]));

        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.recent_limit, DEFAULT_RECENT_LIMIT);
        assert_eq!(config.model_path, default_model_path());
    }

    #[test]
    fn test_non_finite_threshold_falls_back() {
        let config = Config::from_lookup(lookup(&[("ANOMALY_THRESHOLD", "NaN")]));
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.threshold = -1.0;
        assert!(config.validate().is_err());
    }
}
