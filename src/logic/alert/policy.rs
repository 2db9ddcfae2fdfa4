//! Alert Policy
//!
//! Static threshold on the reconstruction error. A flow alerts iff its score
//! is strictly greater than the threshold. No deduplication, no rate limiting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::record::AlertRecord;
use crate::constants::{DEFAULT_THRESHOLD, UNKNOWN_LABEL};
use crate::logic::features::FeatureVector;
use crate::logic::flow::FlowRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    threshold: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD }
    }
}

impl AlertPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Check if score exceeds threshold
    pub fn is_anomaly(&self, score: f64) -> bool {
        score > self.threshold
    }

    /// Alert for a scored flow, if it qualifies
    pub fn evaluate_flow(
        &self,
        flow: &FlowRecord,
        features: &FeatureVector,
        score: f64,
        ts: DateTime<Utc>,
    ) -> Option<AlertRecord> {
        if !self.is_anomaly(score) {
            return None;
        }

        let mut metadata = match serde_json::to_value(flow) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        merge_features(&mut metadata, features, score);

        Some(AlertRecord {
            id: None,
            ts,
            src: flow.src_label(),
            dst: flow.dst_label(),
            proto: flow.proto_label(),
            score,
            metadata: Value::Object(metadata),
        })
    }

    /// Alert for a bare feature row with no flow identity behind it
    pub fn evaluate_features(&self, features: &FeatureVector, score: f64, ts: DateTime<Utc>) -> Option<AlertRecord> {
        if !self.is_anomaly(score) {
            return None;
        }

        let mut metadata = Map::new();
        merge_features(&mut metadata, features, score);

        Some(AlertRecord {
            id: None,
            ts,
            src: UNKNOWN_LABEL.to_string(),
            dst: UNKNOWN_LABEL.to_string(),
            proto: UNKNOWN_LABEL.to_string(),
            score,
            metadata: Value::Object(metadata),
        })
    }
}

/// Derived features are added next to the flow fields; flow fields keep their exact values
fn merge_features(metadata: &mut Map<String, Value>, features: &FeatureVector, score: f64) {
    for (name, value) in features.named_values() {
        metadata.entry(name).or_insert(value);
    }
    metadata.insert("score".to_string(), json!(score));
}
