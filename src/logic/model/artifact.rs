//! Model Artifact - Persisted autoencoder + scaler bundle
//!
//! One JSON file carries everything scoring needs: the feature schema, the
//! network shape and parameters, the frozen scaler and a SHA-256 checksum of
//! the numbers. Loading validates, in order:
//!
//! 1. format version and feature schema
//! 2. scaler dimensionality
//! 3. layer shapes against (D, L)
//! 4. parameter checksum
//!
//! Any failure is a configuration mismatch raised before a single score exists.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::network::{Activation, Autoencoder, DenseLayer, HIDDEN_DIMS};
use super::scaler::Scaler;
use super::trainer::{TrainedModel, TrainingReport};
use crate::logic::error::{Result, SentinelError};
use crate::logic::features::{LayoutInfo, FEATURE_COUNT};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Flattened dense layer. Weights are row-major (inputs × outputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub inputs: usize,
    pub outputs: usize,
    pub activation: Activation,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl From<&DenseLayer> for LayerParams {
    fn from(layer: &DenseLayer) -> Self {
        Self {
            inputs: layer.inputs(),
            outputs: layer.outputs(),
            activation: layer.activation,
            weights: layer.weights.iter().copied().collect(),
            bias: layer.bias.to_vec(),
        }
    }
}

impl LayerParams {
    fn to_layer(&self, index: usize) -> Result<DenseLayer> {
        let weights = Array2::from_shape_vec((self.inputs, self.outputs), self.weights.clone())
            .map_err(|e| {
                SentinelError::ConfigMismatch(format!(
                    "Layer {} declares {}x{} but holds {} weights: {}",
                    index,
                    self.inputs,
                    self.outputs,
                    self.weights.len(),
                    e
                ))
            })?;

        Ok(DenseLayer {
            weights,
            bias: Array1::from_vec(self.bias.clone()),
            activation: self.activation,
        })
    }
}

/// Where the parameters came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub training: Option<TrainingReport>,
}

/// Serialized model bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub schema: LayoutInfo,
    pub input_dim: usize,
    pub latent_dim: usize,
    pub hidden_dims: Vec<usize>,
    pub layers: Vec<LayerParams>,
    pub scaler: Scaler,
    pub metadata: ModelMetadata,
    /// Hex SHA-256 over dims, layer parameters and scaler state
    pub checksum: String,
}

// ============================================================================
// BUILD / CHECKSUM
// ============================================================================

impl ModelArtifact {
    pub fn new(model: &Autoencoder, scaler: &Scaler, training: Option<TrainingReport>) -> Self {
        let layers: Vec<LayerParams> = model.layers().iter().map(LayerParams::from).collect();
        let checksum = compute_checksum(model.input_dim(), model.latent_dim(), &layers, scaler);

        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            schema: scaler.schema.clone(),
            input_dim: model.input_dim(),
            latent_dim: model.latent_dim(),
            hidden_dims: HIDDEN_DIMS.to_vec(),
            layers,
            scaler: scaler.clone(),
            metadata: ModelMetadata {
                created_at: Utc::now(),
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                training,
            },
            checksum,
        }
    }

    pub fn from_trained(trained: &TrainedModel) -> Self {
        Self::new(&trained.model, &trained.scaler, Some(trained.report.clone()))
    }

    /// Run every load-time check and rebuild the network
    pub fn validate(&self) -> Result<Autoencoder> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(SentinelError::ConfigMismatch(format!(
                "Unsupported model format v{} (expected v{})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        self.schema.validate()?;
        if self.scaler.schema != self.schema {
            return Err(SentinelError::ConfigMismatch("Scaler schema differs from model schema".into()));
        }
        if self.input_dim != FEATURE_COUNT {
            return Err(SentinelError::ConfigMismatch(format!(
                "Model trained on {} features, layout has {}",
                self.input_dim, FEATURE_COUNT
            )));
        }

        self.scaler.validate()?;
        if self.scaler.dim() != self.input_dim {
            return Err(SentinelError::ConfigMismatch(format!(
                "Scaler has {} features, model expects {}",
                self.scaler.dim(),
                self.input_dim
            )));
        }

        if self.hidden_dims != HIDDEN_DIMS {
            return Err(SentinelError::ConfigMismatch(format!(
                "Hidden widths {:?} differ from {:?}",
                self.hidden_dims, HIDDEN_DIMS
            )));
        }
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, p)| p.to_layer(i))
            .collect::<Result<Vec<_>>>()?;
        let model = Autoencoder::from_layers(self.input_dim, self.latent_dim, layers)?;

        let expected = compute_checksum(self.input_dim, self.latent_dim, &self.layers, &self.scaler);
        if expected != self.checksum {
            return Err(SentinelError::ConfigMismatch(format!(
                "Model checksum mismatch: stored {}, computed {}",
                self.checksum, expected
            )));
        }

        Ok(model)
    }

    /// Validated (model, scaler) pair
    pub fn into_parts(self) -> Result<(Autoencoder, Scaler)> {
        let model = self.validate()?;
        Ok((model, self.scaler))
    }
}

fn compute_checksum(input_dim: usize, latent_dim: usize, layers: &[LayerParams], scaler: &Scaler) -> String {
    let mut hasher = Sha256::new();
    hasher.update((input_dim as u64).to_le_bytes());
    hasher.update((latent_dim as u64).to_le_bytes());

    for layer in layers {
        hasher.update((layer.inputs as u64).to_le_bytes());
        hasher.update((layer.outputs as u64).to_le_bytes());
        hasher.update([layer.activation.tag()]);
        for w in layer.weights.iter().chain(layer.bias.iter()) {
            hasher.update(w.to_le_bytes());
        }
    }
    for v in scaler.mean.iter().chain(scaler.scale.iter()) {
        hasher.update(v.to_le_bytes());
    }

    hex::encode(hasher.finalize())
}

// ============================================================================
// STORAGE
// ============================================================================

/// Save artifact to disk
pub fn save_artifact(artifact: &ModelArtifact, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(artifact)?;
    fs::write(path, json)?;
    log::info!("Model saved to {}", path.display());
    Ok(())
}

/// Load artifact from disk with validation
pub fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let data = fs::read(path)
        .map_err(|e| SentinelError::Input(format!("Cannot read model {}: {}", path.display(), e)))?;

    let artifact: ModelArtifact = serde_json::from_slice(&data)
        .map_err(|e| SentinelError::ConfigMismatch(format!("Unreadable model {}: {}", path.display(), e)))?;

    artifact.validate()?;
    Ok(artifact)
}
