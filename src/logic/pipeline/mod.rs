//! Pipeline Module - One scoring pass from flows to persisted alerts
//!
//! ```text
//! packets → aggregate → extract → scale → score → policy → store
//! ```
//!
//! Everything up to the policy is all-or-nothing: a scoring error aborts the
//! pass before any alert is written. Inserts are independent of each other,
//! so one failed write is counted and logged while the rest go through.

pub mod job;


use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::logic::alert::{AlertPolicy, AlertRecord, AlertStore};
use crate::logic::capture::PacketObservation;
use crate::logic::error::{Result, SentinelError};
use crate::logic::features::{extract_features, FeatureVector};
use crate::logic::flow::{aggregate, FlowRecord};
use crate::logic::model::AnomalyDetector;

pub use job::{JobHandle, JobRunner, JobStatus};

/// Outcome of one scoring pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub flows_scored: usize,
    pub alerts_raised: usize,
    pub alerts_persisted: usize,
    pub failed_inserts: usize,
    pub max_score: Option<f64>,
    /// Row ids of persisted alerts, in flow order
    pub alert_ids: Vec<i64>,
}

/// Frozen detector + policy, reusable across passes
#[derive(Clone)]
pub struct ScoringPass {
    detector: Arc<AnomalyDetector>,
    policy: AlertPolicy,
}

impl ScoringPass {
    pub fn new(detector: Arc<AnomalyDetector>, policy: AlertPolicy) -> Self {
        Self { detector, policy }
    }

    pub fn detector(&self) -> &Arc<AnomalyDetector> {
        &self.detector
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// Feature vector and score per flow, in input order
    pub fn score_flows(&self, flows: &[FlowRecord]) -> Result<Vec<(FeatureVector, f64)>> {
        if flows.is_empty() {
            return Err(SentinelError::DegenerateData("no flows to score".into()));
        }

        let vectors: Vec<FeatureVector> = flows.iter().map(extract_features).collect();
        let scores = self.detector.score_batch(&vectors)?;
        Ok(vectors.into_iter().zip(scores).collect())
    }

    /// Score flows and persist an alert for every flow above the threshold
    pub fn run_flows(&self, flows: &[FlowRecord], store: &dyn AlertStore) -> Result<PassSummary> {
        let scored = match self.score_flows(flows) {
            Ok(scored) => scored,
            Err(SentinelError::DegenerateData(msg)) => {
                log::info!("Scoring pass skipped: {}", msg);
                return Ok(PassSummary::default());
            }
            Err(e) => return Err(e),
        };

        let ts = Utc::now();
        let alerts = flows
            .iter()
            .zip(scored.iter())
            .filter_map(|(flow, (features, score))| self.policy.evaluate_flow(flow, features, *score, ts));

        let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();
        Ok(persist(alerts, &scores, store))
    }

    /// Score bare feature rows; alerts carry "n/a" for src, dst and proto
    pub fn run_features(&self, vectors: &[FeatureVector], store: &dyn AlertStore) -> Result<PassSummary> {
        if vectors.is_empty() {
            log::info!("Scoring pass skipped: no feature rows to score");
            return Ok(PassSummary::default());
        }

        let scores = self.detector.score_batch(vectors)?;

        let ts = Utc::now();
        let alerts = vectors
            .iter()
            .zip(scores.iter())
            .filter_map(|(features, score)| self.policy.evaluate_features(features, *score, ts));

        Ok(persist(alerts, &scores, store))
    }

    /// Aggregate a packet batch, then score the resulting flows
    pub fn run_packets(&self, packets: &[PacketObservation], store: &dyn AlertStore) -> Result<PassSummary> {
        if packets.is_empty() {
            log::info!("Scoring pass skipped: no packets");
            return Ok(PassSummary::default());
        }
        let flows = aggregate(packets);
        self.run_flows(&flows, store)
    }
}

fn persist(alerts: impl Iterator<Item = AlertRecord>, scores: &[f64], store: &dyn AlertStore) -> PassSummary {
    let mut summary = PassSummary {
        flows_scored: scores.len(),
        max_score: scores.iter().copied().fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s)))),
        ..Default::default()
    };

    for alert in alerts {
        summary.alerts_raised += 1;
        match store.insert(&alert) {
            Ok(id) => {
                summary.alerts_persisted += 1;
                summary.alert_ids.push(id);
            }
            Err(e) => {
                summary.failed_inserts += 1;
                log::error!(
                    "Failed to persist alert {} → {} ({}) score={:.6}: {}",
                    alert.src,
                    alert.dst,
                    alert.proto,
                    alert.score,
                    e
                );
            }
        }
    }

    log::info!(
        "Scored {} flows: {} alerts ({} stored, {} failed)",
        summary.flows_scored,
        summary.alerts_raised,
        summary.alerts_persisted,
        summary.failed_inserts
    );
    summary
}
