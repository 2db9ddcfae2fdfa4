//! Inference Engine - Frozen autoencoder scoring
//!
//! Bundles the validated (model, scaler) pair behind one type and keeps
//! latency counters for status reporting. The detector is read-only after
//! construction and is shared across scoring passes in an `Arc`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::artifact::load_artifact;
use super::network::Autoencoder;
use super::scaler::Scaler;
use crate::logic::error::{Result, SentinelError};
use crate::logic::features::{FeatureVector, LayoutInfo};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Engine Status for the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model_loaded: bool,
    pub model_path: String,
    pub schema: Option<LayoutInfo>,
    pub input_dim: Option<usize>,
    pub latent_dim: Option<usize>,
    pub threshold: f64,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
}

impl EngineStatus {
    /// Status when no model could be loaded
    pub fn unloaded(model_path: &Path, threshold: f64) -> Self {
        Self {
            model_loaded: false,
            model_path: model_path.display().to_string(),
            schema: None,
            input_dim: None,
            latent_dim: None,
            threshold,
            avg_latency_ms: 0.0,
            inference_count: 0,
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct AnomalyDetector {
    model: Autoencoder,
    scaler: Scaler,
    source: Option<PathBuf>,
    /// Cumulative latency in microseconds
    latency_sum: AtomicU64,
    inference_count: AtomicU64,
}

impl AnomalyDetector {
    /// Pair a model with its scaler, rejecting mismatched shapes up front
    pub fn new(model: Autoencoder, scaler: Scaler) -> Result<Self> {
        scaler.validate()?;
        if scaler.dim() != model.input_dim() {
            return Err(SentinelError::ConfigMismatch(format!(
                "Scaler has {} features, model expects {}",
                scaler.dim(),
                model.input_dim()
            )));
        }

        Ok(Self {
            model,
            scaler,
            source: None,
            latency_sum: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        })
    }

    /// Load and validate a saved artifact
    pub fn load(path: &Path) -> Result<Self> {
        log::info!("Loading model from: {}", path.display());

        let (model, scaler) = load_artifact(path)?.into_parts()?;
        let mut detector = Self::new(model, scaler)?;
        detector.source = Some(path.to_path_buf());

        log::info!(
            "Model loaded: {} features → latent {}",
            detector.model.input_dim(),
            detector.model.latent_dim()
        );
        Ok(detector)
    }

    pub fn model(&self) -> &Autoencoder {
        &self.model
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn schema(&self) -> &LayoutInfo {
        &self.scaler.schema
    }

    /// Reconstruction error of one raw (unscaled) feature vector
    pub fn score(&self, vector: &FeatureVector) -> Result<f64> {
        let started = Instant::now();
        let z = self.scaler.transform(vector)?;
        let score = self.model.score(z.view())?;
        self.record(started, 1);
        Ok(score)
    }

    /// Scores for a batch, in input order. Fails as a whole on the first bad vector.
    pub fn score_batch(&self, vectors: &[FeatureVector]) -> Result<Vec<f64>> {
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let z = self.scaler.transform_batch(vectors)?;
        let scores = self.model.score_batch(z.view())?;
        self.record(started, vectors.len() as u64);
        Ok(scores)
    }

    fn record(&self, started: Instant, count: u64) {
        let elapsed = started.elapsed().as_micros() as u64;
        self.latency_sum.fetch_add(elapsed, Ordering::Relaxed);
        self.inference_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn status(&self, threshold: f64) -> EngineStatus {
        let sum = self.latency_sum.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            model_loaded: true,
            model_path: self
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".to_string()),
            schema: Some(self.schema().clone()),
            input_dim: Some(self.model.input_dim()),
            latent_dim: Some(self.model.latent_dim()),
            threshold,
            avg_latency_ms: avg,
            inference_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::artifact::{save_artifact, ModelArtifact};
    use crate::logic::features::FEATURE_COUNT;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn parts() -> (Autoencoder, Scaler, Vec<FeatureVector>) {
        let vectors: Vec<FeatureVector> = (1..=20)
            .map(|i| FeatureVector::from_values([i as f32 * 0.2, i as f32, 64.0 * i as f32, 64.0, 320.0, 5.0, 1.0]))
            .collect();
        let scaler = Scaler::fit(&vectors).unwrap();
        let model = Autoencoder::new(FEATURE_COUNT, &mut StdRng::seed_from_u64(5));
        (model, scaler, vectors)
    }

    #[test]
    fn test_scores_are_deterministic() {
        let (model, scaler, vectors) = parts();
        let detector = AnomalyDetector::new(model, scaler).unwrap();

        let first = detector.score_batch(&vectors).unwrap();
        let second = detector.score_batch(&vectors).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|s| *s >= 0.0));

        let single = detector.score(&vectors[3]).unwrap();
        assert!((single - first[3]).abs() <= 1e-5 * first[3].max(1.0));
    }

    #[test]
    fn test_status_counts_inferences() {
        let (model, scaler, vectors) = parts();
        let detector = AnomalyDetector::new(model, scaler).unwrap();
        detector.score_batch(&vectors).unwrap();

        let status = detector.status(0.01);
        assert!(status.model_loaded);
        assert_eq!(status.inference_count, vectors.len() as u64);
        assert_eq!(status.latent_dim, Some(3));
        assert_eq!(status.model_path, "<memory>");
    }

    #[test]
    fn test_incompatible_vector_rejected() {
        let (model, scaler, _) = parts();
        let detector = AnomalyDetector::new(model, scaler).unwrap();

        let mut foreign = FeatureVector::new();
        foreign.version = 9;
        assert!(matches!(detector.score(&foreign), Err(SentinelError::ConfigMismatch(_))));
    }

    #[test]
    fn test_load_from_disk_matches_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (model, scaler, vectors) = parts();

        save_artifact(&ModelArtifact::new(&model, &scaler, None), &path).unwrap();

        let in_memory = AnomalyDetector::new(model, scaler).unwrap();
        let loaded = AnomalyDetector::load(&path).unwrap();

        assert_eq!(loaded.score_batch(&vectors).unwrap(), in_memory.score_batch(&vectors).unwrap());
        assert_eq!(loaded.status(0.5).model_path, path.display().to_string());
    }

    #[test]
    fn test_bad_scaler_rejected_at_construction() {
        let (model, mut scaler, _) = parts();
        scaler.mean.push(0.0);

        assert!(AnomalyDetector::new(model, scaler).is_err());
    }
}
