//! Flow Feature Extraction
//!
//! Turns one FlowRecord into the 7-column vector. Pure: the same record always
//! yields the same vector.

use super::vector::{FeatureExtractor, FeatureVector, FeatureVectorBuilder};
use crate::logic::flow::FlowRecord;

/// Rate with the zero-duration fallback: the raw amount stands in for the rate
fn per_second(amount: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        amount / duration
    } else {
        amount
    }
}

impl FlowRecord {
    pub fn bytes_per_sec(&self) -> f64 {
        per_second(self.total_bytes as f64, self.duration)
    }

    pub fn pkts_per_sec(&self) -> f64 {
        per_second(self.packet_count as f64, self.duration)
    }
}

impl FeatureExtractor for FlowRecord {
    fn extract(&self, vector: &mut FeatureVector) {
        *vector = FeatureVectorBuilder::new()
            .duration(self.duration as f32)
            .packet_count(self.packet_count as f32)
            .total_bytes(self.total_bytes as f32)
            .avg_pkt_size(self.avg_pkt_size as f32)
            .bytes_per_sec(self.bytes_per_sec() as f32)
            .pkts_per_sec(self.pkts_per_sec() as f32)
            .proto_num(self.key.protocol.proto_num())
            .build();
    }
}

/// Extract the feature vector of a flow
pub fn extract_features(flow: &FlowRecord) -> FeatureVector {
    flow.to_vector()
}

/// Extract vectors for a batch, preserving input order
pub fn extract_all(flows: &[FlowRecord]) -> Vec<FeatureVector> {
    flows.iter().map(extract_features).collect()
}
