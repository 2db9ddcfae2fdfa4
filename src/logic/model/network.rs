//! Autoencoder Network
//!
//! Fully connected encoder/decoder over the normalized feature space:
//!
//! ```text
//! D → 16 → 8 → L → 8 → 16 → D      L = max(1, min(3, D / 2))
//! ```
//!
//! ReLU follows every hidden layer. The latent and output layers are linear.
//! The reconstruction error of a vector is its anomaly score.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::logic::error::{Result, SentinelError};

/// Encoder hidden widths; the decoder mirrors them
pub const HIDDEN_DIMS: [usize; 2] = [16, 8];

/// Latent width for a given input dimensionality.
///
/// `min(3, D / 2)`, floored at 1 so a single-feature input still gets a
/// one-wide bottleneck instead of a zero-width layer.
pub fn latent_dim_for(input_dim: usize) -> usize {
    3.min(input_dim / 2).max(1)
}

/// Layer widths from input to reconstruction
pub fn layer_dims(input_dim: usize, latent_dim: usize) -> Vec<usize> {
    let mut dims = vec![input_dim];
    dims.extend(HIDDEN_DIMS);
    dims.push(latent_dim);
    dims.extend(HIDDEN_DIMS.iter().rev());
    dims.push(input_dim);
    dims
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    /// Fixed activation of layer `index` in a stack of `layer_count` layers:
    /// linear at the latent and output layers, ReLU elsewhere
    pub fn for_layer(index: usize, layer_count: usize) -> Self {
        if index == HIDDEN_DIMS.len() || index + 1 == layer_count {
            Activation::Linear
        } else {
            Activation::Relu
        }
    }

    /// Stable one-byte tag, hashed into artifact checksums
    pub fn tag(self) -> u8 {
        match self {
            Activation::Relu => 1,
            Activation::Linear => 2,
        }
    }

    fn apply(self, z: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => z.mapv(|x| x.max(0.0)),
            Activation::Linear => z.clone(),
        }
    }

    /// Derivative evaluated at the pre-activation
    pub(crate) fn gradient(self, z: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => z.mapv(|x| if x > 0.0 { 1.0 } else { 0.0 }),
            Activation::Linear => Array2::ones(z.raw_dim()),
        }
    }
}

/// Dense layer: `y = act(x · W + b)` with W shaped (inputs, outputs)
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    /// Uniform ±1/√fan_in initialization
    pub fn init<R: Rng + ?Sized>(inputs: usize, outputs: usize, activation: Activation, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs as f32).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_fn(outputs, |_| rng.gen_range(-bound..bound));
        Self { weights, bias, activation }
    }

    pub fn inputs(&self) -> usize {
        self.weights.nrows()
    }

    pub fn outputs(&self) -> usize {
        self.weights.ncols()
    }

    /// Pre-activation for a batch
    pub(crate) fn linear(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        x.dot(&self.weights) + &self.bias
    }

    pub fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        self.activation.apply(&self.linear(x))
    }
}

/// Intermediate values of one forward pass, kept for backpropagation
pub(crate) struct ForwardCache {
    /// Layer inputs; `inputs[0]` is the batch itself
    pub inputs: Vec<Array2<f32>>,
    /// Pre-activations per layer
    pub pre_activations: Vec<Array2<f32>>,
    pub output: Array2<f32>,
}

/// Symmetric dense autoencoder
#[derive(Debug, Clone, PartialEq)]
pub struct Autoencoder {
    input_dim: usize,
    latent_dim: usize,
    layers: Vec<DenseLayer>,
}

impl Autoencoder {
    /// Fresh randomly initialized network for `input_dim` features
    pub fn new<R: Rng + ?Sized>(input_dim: usize, rng: &mut R) -> Self {
        let latent_dim = latent_dim_for(input_dim);
        let dims = layer_dims(input_dim, latent_dim);
        let count = dims.len() - 1;

        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, pair)| DenseLayer::init(pair[0], pair[1], Activation::for_layer(i, count), rng))
            .collect();

        Self { input_dim, latent_dim, layers }
    }

    /// Rebuild from stored layers, checking every shape and activation against (D, L)
    pub fn from_layers(input_dim: usize, latent_dim: usize, layers: Vec<DenseLayer>) -> Result<Self> {
        let dims = layer_dims(input_dim, latent_dim);
        if layers.len() != dims.len() - 1 {
            return Err(SentinelError::ConfigMismatch(format!(
                "Model has {} layers, expected {}",
                layers.len(),
                dims.len() - 1
            )));
        }

        for (i, (layer, pair)) in layers.iter().zip(dims.windows(2)).enumerate() {
            if layer.inputs() != pair[0] || layer.outputs() != pair[1] || layer.bias.len() != pair[1] {
                return Err(SentinelError::ConfigMismatch(format!(
                    "Layer {} is {}x{} (bias {}), expected {}x{}",
                    i,
                    layer.inputs(),
                    layer.outputs(),
                    layer.bias.len(),
                    pair[0],
                    pair[1]
                )));
            }

            let expected = Activation::for_layer(i, layers.len());
            if layer.activation != expected {
                return Err(SentinelError::ConfigMismatch(format!(
                    "Layer {} uses {:?} activation, expected {:?}",
                    i, layer.activation, expected
                )));
            }
        }

        Ok(Self { input_dim, latent_dim, layers })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    fn check_input(&self, cols: usize) -> Result<()> {
        if cols != self.input_dim {
            return Err(SentinelError::ConfigMismatch(format!(
                "Model expects {} features, got {}",
                self.input_dim, cols
            )));
        }
        Ok(())
    }

    /// Reconstruct a batch of normalized rows
    pub fn reconstruct_batch(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x.ncols())?;

        let mut current = x.to_owned();
        for layer in &self.layers {
            current = layer.forward(&current.view());
        }
        Ok(current)
    }

    pub fn reconstruct(&self, x: ArrayView1<f32>) -> Result<Array1<f32>> {
        let batch = x.insert_axis(Axis(0));
        let out = self.reconstruct_batch(batch)?;
        Ok(out.row(0).to_owned())
    }

    /// Latent code of a batch
    pub fn encode_batch(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x.ncols())?;

        let mut current = x.to_owned();
        for layer in &self.layers[..=HIDDEN_DIMS.len()] {
            current = layer.forward(&current.view());
        }
        Ok(current)
    }

    /// Mean squared reconstruction error of one normalized vector
    pub fn score(&self, x: ArrayView1<f32>) -> Result<f64> {
        let recon = self.reconstruct(x)?;
        Ok(mean_squared_error(x, recon.view()))
    }

    /// Per-row reconstruction error
    pub fn score_batch(&self, x: ArrayView2<f32>) -> Result<Vec<f64>> {
        let recon = self.reconstruct_batch(x)?;
        Ok(x.rows()
            .into_iter()
            .zip(recon.rows())
            .map(|(a, b)| mean_squared_error(a, b))
            .collect())
    }

    pub(crate) fn forward_cached(&self, x: ArrayView2<f32>) -> ForwardCache {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len());

        let mut current = x.to_owned();
        for layer in &self.layers {
            let z = layer.linear(&current.view());
            let a = layer.activation.apply(&z);
            inputs.push(current);
            pre_activations.push(z);
            current = a;
        }

        ForwardCache { inputs, pre_activations, output: current }
    }

    /// Total trainable parameters
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.weights.len() + l.bias.len()).sum()
    }
}

fn mean_squared_error(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f64 {
    let n = a.len().max(1) as f64;
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        / n
}
