//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment overrides are applied in `logic::config`.

use std::path::PathBuf;

/// Default anomaly threshold (mean squared reconstruction error)
pub const DEFAULT_THRESHOLD: f64 = 0.01;

/// Default number of rows returned by a recent-alerts query
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Label used for alert fields that have no flow identity behind them
pub const UNKNOWN_LABEL: &str = "n/a";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name, also the data directory name
pub const APP_NAME: &str = "flow-sentinel";

// ============================================
// Environment variable names
// ============================================

pub const ENV_MODEL_PATH: &str = "MODEL_PATH";
pub const ENV_ALERT_DB_PATH: &str = "ALERT_DB_PATH";
pub const ENV_THRESHOLD: &str = "ANOMALY_THRESHOLD";
pub const ENV_RECENT_LIMIT: &str = "RECENT_ALERT_LIMIT";

// ============================================
// Default paths
// ============================================

/// Per-user data directory, falling back to the working directory
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_model_path() -> PathBuf {
    data_dir().join("model.json")
}

pub fn default_alert_db_path() -> PathBuf {
    data_dir().join("alerts.db")
}
