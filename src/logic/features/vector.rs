//! Feature Vector - One flow's model input
//!
//! Values sit in `FEATURE_LAYOUT` order and carry the layout version and hash
//! they were produced under, so rows read back from disk can be rejected
//! before they reach a scaler fitted on a different layout.

use serde::{Deserialize, Serialize};
use super::layout::{
    FEATURE_COUNT, FEATURE_VERSION, FEATURE_LAYOUT,
    layout_hash, validate_layout, LayoutMismatchError,
};
use crate::logic::error::{Result, SentinelError};

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a new zeroed feature vector with current version
    pub fn new() -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: [0.0; FEATURE_COUNT],
        }
    }

    /// Create from raw values with current version
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    /// Create from a slice. A wrong length is a configuration error, never padded.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let array: [f32; FEATURE_COUNT] = values.try_into().map_err(|_| {
            SentinelError::ConfigMismatch(format!(
                "Expected {} features, got {}",
                FEATURE_COUNT,
                values.len()
            ))
        })?;
        Ok(Self::from_values(array))
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        super::layout::feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by index
    pub fn set(&mut self, index: usize, value: f32) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
        }
    }

    /// Set feature by name
    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        if let Some(index) = super::layout::feature_index(name) {
            self.set(index, value);
            true
        } else {
            false
        }
    }

    /// Validate that this vector is compatible with current layout
    pub fn validate(&self) -> std::result::Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }

    /// Named values as a JSON object, in layout order
    pub fn named_values(&self) -> serde_json::Map<String, serde_json::Value> {
        FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FEATURE EXTRACTOR TRAIT
// ============================================================================

/// Trait for anything that contributes values to a feature vector
pub trait FeatureExtractor {
    /// Extract features and update the vector
    fn extract(&self, vector: &mut FeatureVector);

    /// Extract into a fresh vector
    fn to_vector(&self) -> FeatureVector {
        let mut vector = FeatureVector::new();
        self.extract(&mut vector);
        vector
    }
}

// ============================================================================
// BUILDER PATTERN
// ============================================================================

/// Builder for creating FeatureVector with named setters
pub struct FeatureVectorBuilder {
    vector: FeatureVector,
}

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self { vector: FeatureVector::new() }
    }

    pub fn duration(mut self, value: f32) -> Self {
        self.vector.set_by_name("duration", value);
        self
    }

    pub fn packet_count(mut self, value: f32) -> Self {
        self.vector.set_by_name("packet_count", value);
        self
    }

    pub fn total_bytes(mut self, value: f32) -> Self {
        self.vector.set_by_name("total_bytes", value);
        self
    }

    pub fn avg_pkt_size(mut self, value: f32) -> Self {
        self.vector.set_by_name("avg_pkt_size", value);
        self
    }

    pub fn bytes_per_sec(mut self, value: f32) -> Self {
        self.vector.set_by_name("bytes_per_sec", value);
        self
    }

    pub fn pkts_per_sec(mut self, value: f32) -> Self {
        self.vector.set_by_name("pkts_per_sec", value);
        self
    }

    pub fn proto_num(mut self, value: f32) -> Self {
        self.vector.set_by_name("proto_num", value);
        self
    }

    pub fn build(self) -> FeatureVector {
        self.vector
    }
}

impl Default for FeatureVectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_new() {
        let vector = FeatureVector::new();
        assert_eq!(vector.version, FEATURE_VERSION);
        assert_eq!(vector.layout_hash, layout_hash());
        assert_eq!(vector.values.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_feature_vector_builder() {
        let vector = FeatureVectorBuilder::new()
            .duration(2.5)
            .proto_num(1.0)
            .build();

        assert_eq!(vector.get_by_name("duration"), Some(2.5));
        assert_eq!(vector.get_by_name("proto_num"), Some(1.0));
        assert_eq!(vector.get_by_name("total_bytes"), Some(0.0));
    }

    #[test]
    fn test_feature_vector_set_by_name() {
        let mut vector = FeatureVector::new();
        assert!(vector.set_by_name("bytes_per_sec", 42.0));
        assert_eq!(vector.get(4), Some(42.0));

        assert!(!vector.set_by_name("nonexistent", 0.0));
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(FeatureVector::from_slice(&[1.0; FEATURE_COUNT]).is_ok());

        let short = FeatureVector::from_slice(&[1.0; FEATURE_COUNT - 1]);
        assert!(matches!(short, Err(SentinelError::ConfigMismatch(_))));

        let long = FeatureVector::from_slice(&[1.0; FEATURE_COUNT + 3]);
        assert!(matches!(long, Err(SentinelError::ConfigMismatch(_))));
    }

    #[test]
    fn test_feature_vector_validation() {
        let mut vector = FeatureVector::new();
        assert!(vector.validate().is_ok());

        vector.layout_hash ^= 0xFFFF;
        assert!(vector.validate().is_err());
    }
}
