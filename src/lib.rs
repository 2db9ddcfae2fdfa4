//! Flow Sentinel - network flow anomaly detection
//!
//! Packets are grouped into 5-tuple flows, each flow becomes a 7-feature
//! vector, and a small autoencoder trained on benign traffic scores how well
//! it can reconstruct the vector. Flows whose reconstruction error exceeds the
//! threshold are stored as alerts.

pub mod constants;
pub mod logic;

pub use logic::alert::{AlertPolicy, AlertRecord, AlertStore, SqliteAlertStore};
pub use logic::config::Config;
pub use logic::error::{Result, SentinelError};
pub use logic::features::{extract_features, FeatureVector};
pub use logic::flow::{aggregate, FlowKey, FlowRecord, Protocol};
pub use logic::model::{train, AnomalyDetector, ModelArtifact, TrainingConfig};
pub use logic::pipeline::{JobRunner, PassSummary, ScoringPass};
