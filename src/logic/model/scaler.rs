//! Standard Scaler
//!
//! Per-feature standardization fitted once on the training vectors and frozen
//! into the model artifact. Inference reuses the exact mean/scale pair, so
//! training and scoring always see the same normalized space.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::logic::error::{Result, SentinelError};
use crate::logic::features::{FeatureVector, LayoutInfo, FEATURE_COUNT};

/// Frozen normalization state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    /// Layout the columns were fitted on
    pub schema: LayoutInfo,
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl Scaler {
    /// Fit mean and population standard deviation per column.
    ///
    /// Columns with zero (or non-finite) spread get a scale of 1, so constant
    /// features pass through centered instead of dividing by zero.
    pub fn fit(vectors: &[FeatureVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(SentinelError::Input("Cannot fit scaler on an empty training set".into()));
        }
        for vector in vectors {
            vector.validate()?;
        }

        let n = vectors.len() as f64;
        let mut mean = [0.0f64; FEATURE_COUNT];
        for vector in vectors {
            for (m, &x) in mean.iter_mut().zip(vector.values.iter()) {
                *m += x as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut variance = [0.0f64; FEATURE_COUNT];
        for vector in vectors {
            for i in 0..FEATURE_COUNT {
                let d = vector.values[i] as f64 - mean[i];
                variance[i] += d * d;
            }
        }

        let scale: Vec<f32> = variance
            .iter()
            .map(|&v| {
                let std = (v / n).sqrt() as f32;
                if std.is_finite() && std > 0.0 { std } else { 1.0 }
            })
            .collect();

        log::debug!("Scaler fitted on {} vectors", vectors.len());

        Ok(Self {
            schema: LayoutInfo::current(),
            mean: mean.iter().map(|&m| m as f32).collect(),
            scale,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Check stored state against the running layout
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(SentinelError::ConfigMismatch(format!(
                "Scaler has {} means and {} scales, expected {}",
                self.mean.len(),
                self.scale.len(),
                FEATURE_COUNT
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(SentinelError::ConfigMismatch("Scaler contains a zero or non-finite scale".into()));
        }
        Ok(())
    }

    /// (v - mean) / scale
    pub fn transform(&self, vector: &FeatureVector) -> Result<Array1<f32>> {
        vector.validate()?;
        self.check_dim(vector.values.len())?;

        Ok(vector
            .values
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect())
    }

    /// Transform a batch into an (n, D) matrix, one row per vector
    pub fn transform_batch(&self, vectors: &[FeatureVector]) -> Result<Array2<f32>> {
        let mut out = Array2::zeros((vectors.len(), self.dim()));
        for (mut row, vector) in out.rows_mut().into_iter().zip(vectors) {
            row.assign(&self.transform(vector)?);
        }
        Ok(out)
    }

    /// Undo [`Scaler::transform`]
    pub fn inverse_transform(&self, scaled: ArrayView1<f32>) -> Result<FeatureVector> {
        self.check_dim(scaled.len())?;

        let values: Vec<f32> = scaled
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&z, (&m, &s))| z * s + m)
            .collect();

        FeatureVector::from_slice(&values)
    }

    fn check_dim(&self, len: usize) -> Result<()> {
        if len != self.dim() {
            return Err(SentinelError::ConfigMismatch(format!(
                "Scaler expects {} features, got {}",
                self.dim(),
                len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vectors() -> Vec<FeatureVector> {
        (0..50)
            .map(|i| {
                let t = i as f32;
                FeatureVector::from_values([t * 0.1, 1.0 + t, 60.0 * (t + 1.0), 60.0, 600.0 + t, 10.0, 1.0])
            })
            .collect()
    }

    #[test]
    fn test_empty_fit_is_input_error() {
        assert!(matches!(Scaler::fit(&[]), Err(SentinelError::Input(_))));
    }

    #[test]
    fn test_fit_centers_and_scales() {
        let scaler = Scaler::fit(&sample_vectors()).unwrap();
        let scaled = scaler.transform_batch(&sample_vectors()).unwrap();

        for col in scaled.columns() {
            let mean = col.mean().unwrap();
            assert!(mean.abs() < 1e-4, "column mean {}", mean);
        }

        // Variable column has unit population variance
        let col = scaled.column(1);
        let var = col.mapv(|x| x * x).mean().unwrap();
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_constant_columns_clamp_to_one() {
        let scaler = Scaler::fit(&sample_vectors()).unwrap();
        // avg_pkt_size, pkts_per_sec and proto_num are constant
        assert_eq!(scaler.scale[3], 1.0);
        assert_eq!(scaler.scale[5], 1.0);
        assert_eq!(scaler.scale[6], 1.0);

        let z = scaler.transform(&sample_vectors()[0]).unwrap();
        assert!(z.iter().all(|x| x.is_finite()));
        assert_eq!(z[6], 0.0);
    }

    #[test]
    fn test_round_trip() {
        let vectors = sample_vectors();
        let scaler = Scaler::fit(&vectors).unwrap();

        for v in &vectors {
            let back = scaler.inverse_transform(scaler.transform(v).unwrap().view()).unwrap();
            for (a, b) in back.values.iter().zip(v.values.iter()) {
                assert!((a - b).abs() <= 1e-3 * b.abs().max(1.0), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_single_vector_fit() {
        let one = vec![FeatureVector::from_values([0.0, 1.0, 60.0, 60.0, 60.0, 1.0, 2.0])];
        let scaler = Scaler::fit(&one).unwrap();

        assert!(scaler.scale.iter().all(|&s| s == 1.0));
        assert!(scaler.transform(&one[0]).unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_truncated_state_fails_validation() {
        let mut scaler = Scaler::fit(&sample_vectors()).unwrap();
        assert!(scaler.validate().is_ok());

        scaler.scale.pop();
        assert!(matches!(scaler.validate(), Err(SentinelError::ConfigMismatch(_))));
    }

    #[test]
    fn test_foreign_schema_fails_validation() {
        let mut scaler = Scaler::fit(&sample_vectors()).unwrap();
        scaler.schema.feature_names.swap(0, 1);

        assert!(matches!(scaler.validate(), Err(SentinelError::ConfigMismatch(_))));
    }
}
