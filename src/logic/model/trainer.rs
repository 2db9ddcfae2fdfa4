//! Autoencoder Training
//!
//! Fits the scaler, then minimizes mean squared reconstruction error with Adam
//! over shuffled fixed-size minibatches for a fixed number of epochs. There is
//! no validation split and no early stopping.

use std::time::Instant;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::network::{Autoencoder, DenseLayer};
use super::scaler::Scaler;
use crate::logic::error::{Result, SentinelError};
use crate::logic::features::FeatureVector;

/// Log the epoch loss every N epochs (and on the last one)
const LOG_EVERY_EPOCHS: usize = 5;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    /// Fixed seed for reproducible runs; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 40,
            batch_size: 32,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(SentinelError::Input("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(SentinelError::Input("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SentinelError::Input(format!("invalid learning rate {}", self.learning_rate)));
        }
        Ok(())
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Mean per-sample loss of each epoch
    pub epoch_losses: Vec<f64>,
    pub duration_ms: u64,
    pub trained_at: DateTime<Utc>,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.epoch_losses.last().copied()
    }
}

/// Frozen model, its scaler and how it was produced
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: Autoencoder,
    pub scaler: Scaler,
    pub report: TrainingReport,
}

// ============================================================================
// ADAM
// ============================================================================

struct Moments {
    m_w: Array2<f32>,
    v_w: Array2<f32>,
    m_b: Array1<f32>,
    v_b: Array1<f32>,
}

struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    fn new(model: &Autoencoder, config: &TrainingConfig) -> Self {
        let moments = model
            .layers()
            .iter()
            .map(|l| Moments {
                m_w: Array2::zeros(l.weights.raw_dim()),
                v_w: Array2::zeros(l.weights.raw_dim()),
                m_b: Array1::zeros(l.bias.raw_dim()),
                v_b: Array1::zeros(l.bias.raw_dim()),
            })
            .collect();

        Self {
            lr: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
            step: 0,
            moments,
        }
    }

    fn update(&mut self, layers: &mut [DenseLayer], grads: &[LayerGradient]) {
        self.step += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let c1 = 1.0 - b1.powi(self.step);
        let c2 = 1.0 - b2.powi(self.step);
        let lr = self.lr;

        let apply = |p: &mut f32, m: &mut f32, v: &mut f32, g: &f32| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            let m_hat = *m / c1;
            let v_hat = *v / c2;
            *p -= lr * m_hat / (v_hat.sqrt() + eps);
        };

        for ((layer, state), grad) in layers.iter_mut().zip(self.moments.iter_mut()).zip(grads) {
            Zip::from(&mut layer.weights)
                .and(&mut state.m_w)
                .and(&mut state.v_w)
                .and(&grad.weights)
                .for_each(&apply);
            Zip::from(&mut layer.bias)
                .and(&mut state.m_b)
                .and(&mut state.v_b)
                .and(&grad.bias)
                .for_each(&apply);
        }
    }
}

// ============================================================================
// BACKPROPAGATION
// ============================================================================

pub(crate) struct LayerGradient {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

/// MSE loss of a batch against itself and the gradient of every layer
pub(crate) fn compute_gradients(model: &Autoencoder, x: ArrayView2<f32>) -> (f64, Vec<LayerGradient>) {
    let cache = model.forward_cached(x);
    let diff = &cache.output - &x;
    let count = diff.len().max(1) as f32;
    let loss = diff.iter().map(|&d| (d as f64) * (d as f64)).sum::<f64>() / count as f64;

    let mut upstream = diff * (2.0 / count);
    let mut grads = Vec::with_capacity(model.layers().len());

    for (i, layer) in model.layers().iter().enumerate().rev() {
        let dz = upstream * layer.activation.gradient(&cache.pre_activations[i]);
        let weights = cache.inputs[i].t().dot(&dz);
        let bias = dz.sum_axis(Axis(0));
        upstream = dz.dot(&layer.weights.t());
        grads.push(LayerGradient { weights, bias });
    }

    grads.reverse();
    (loss, grads)
}

// ============================================================================
// TRAINING LOOP
// ============================================================================

/// Fit scaler and autoencoder on a set of benign feature vectors
pub fn train(vectors: &[FeatureVector], config: &TrainingConfig) -> Result<TrainedModel> {
    config.validate()?;
    if vectors.is_empty() {
        return Err(SentinelError::Input("Training set is empty".into()));
    }

    let started = Instant::now();
    let scaler = Scaler::fit(vectors)?;
    let data = scaler.transform_batch(vectors)?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut model = Autoencoder::new(data.ncols(), &mut rng);
    let mut adam = Adam::new(&model, config);

    log::info!(
        "Training autoencoder: {} samples, {} → {} dims, {} parameters, {} epochs",
        vectors.len(),
        model.input_dim(),
        model.latent_dim(),
        model.parameter_count(),
        config.epochs
    );

    let n = data.nrows();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut epoch_losses = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        indices.shuffle(&mut rng);

        let mut total = 0.0f64;
        for chunk in indices.chunks(config.batch_size) {
            let batch = data.select(Axis(0), chunk);
            let (loss, grads) = compute_gradients(&model, batch.view());
            adam.update(model.layers_mut(), &grads);
            total += loss * chunk.len() as f64;
        }

        let epoch_loss = total / n as f64;
        epoch_losses.push(epoch_loss);

        if epoch % LOG_EVERY_EPOCHS == 0 || epoch == config.epochs {
            log::info!("Epoch {}/{} loss={:.6}", epoch, config.epochs, epoch_loss);
        }
    }

    let report = TrainingReport {
        samples: n,
        epochs: config.epochs,
        batch_size: config.batch_size,
        learning_rate: config.learning_rate,
        epoch_losses,
        duration_ms: started.elapsed().as_millis() as u64,
        trained_at: Utc::now(),
    };

    Ok(TrainedModel { model, scaler, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureVectorBuilder;
    use rand::Rng;

    /// Benign-looking flows: rates tied to size and duration
    fn benign(n: usize, seed: u64) -> Vec<FeatureVector> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let duration: f32 = rng.gen_range(0.5..5.0);
                let packets: f32 = rng.gen_range(2.0..40.0f32).round();
                let avg: f32 = rng.gen_range(60.0..900.0);
                let bytes = packets * avg;
                FeatureVectorBuilder::new()
                    .duration(duration)
                    .packet_count(packets)
                    .total_bytes(bytes)
                    .avg_pkt_size(avg)
                    .bytes_per_sec(bytes / duration)
                    .pkts_per_sec(packets / duration)
                    .proto_num(1.0)
                    .build()
            })
            .collect()
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig { seed: Some(42), ..Default::default() }
    }

    #[test]
    fn test_default_hyperparameters() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 40);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 1e-3);
    }

    #[test]
    fn test_empty_training_set() {
        assert!(matches!(train(&[], &quick_config()), Err(SentinelError::Input(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrainingConfig { batch_size: 0, ..quick_config() };
        assert!(train(&benign(10, 1), &config).is_err());
    }

    #[test]
    fn test_loss_decreases() {
        let trained = train(&benign(256, 3), &quick_config()).unwrap();
        let losses = &trained.report.epoch_losses;

        assert_eq!(losses.len(), 40);
        assert!(losses.iter().all(|l| l.is_finite()));
        assert!(losses[losses.len() - 1] < losses[0], "{:?}", losses);
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let data = benign(64, 9);
        let config = TrainingConfig { epochs: 5, ..quick_config() };

        let a = train(&data, &config).unwrap();
        let b = train(&data, &config).unwrap();
        assert_eq!(a.model, b.model);
        assert_eq!(a.report.epoch_losses, b.report.epoch_losses);
    }

    #[test]
    fn test_batch_larger_than_dataset() {
        let config = TrainingConfig { epochs: 2, batch_size: 1000, ..quick_config() };
        let trained = train(&benign(5, 2), &config).unwrap();
        assert_eq!(trained.report.samples, 5);
    }

    #[test]
    fn test_outlier_scores_above_training_data() {
        let data = benign(256, 11);
        let trained = train(&data, &quick_config()).unwrap();

        let scaled = trained.scaler.transform_batch(&data).unwrap();
        let max_benign = trained
            .model
            .score_batch(scaled.view())
            .unwrap()
            .into_iter()
            .fold(0.0f64, f64::max);

        // UDP in an all-TCP world, with a huge byte rate
        let outlier = FeatureVectorBuilder::new()
            .duration(0.01)
            .packet_count(5000.0)
            .total_bytes(7_500_000.0)
            .avg_pkt_size(1500.0)
            .bytes_per_sec(750_000_000.0)
            .pkts_per_sec(500_000.0)
            .proto_num(2.0)
            .build();
        let z = trained.scaler.transform(&outlier).unwrap();
        let score = trained.model.score(z.view()).unwrap();

        assert!(score > max_benign, "outlier {} <= benign max {}", score, max_benign);
    }

    #[test]
    fn test_output_bias_gradient_matches_finite_difference() {
        let data = benign(16, 5);
        let scaler = Scaler::fit(&data).unwrap();
        let x = scaler.transform_batch(&data).unwrap();
        let model = Autoencoder::new(x.ncols(), &mut StdRng::seed_from_u64(1));

        let (_, grads) = compute_gradients(&model, x.view());
        let last = model.layers().len() - 1;

        // Loss is quadratic in the output bias, so central differences are exact
        let h = 1e-2f32;
        for j in 0..x.ncols() {
            let mut plus = model.clone();
            plus.layers_mut()[last].bias[j] += h;
            let mut minus = model.clone();
            minus.layers_mut()[last].bias[j] -= h;

            let (lp, _) = compute_gradients(&plus, x.view());
            let (lm, _) = compute_gradients(&minus, x.view());
            let numeric = (lp - lm) / (2.0 * h as f64);
            let analytic = grads[last].bias[j] as f64;

            assert!((numeric - analytic).abs() < 1e-3, "dim {}: {} vs {}", j, numeric, analytic);
        }
    }
}
