use serde::Serialize;

use super::key::FlowKey;

/// Summary of one flow over the observed window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRecord {
    #[serde(flatten)]
    pub key: FlowKey,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub total_bytes: u64,
    pub packet_count: u64,
    pub avg_pkt_size: f64,
}

impl FlowRecord {
    /// Build a record from its raw totals, deriving duration and average size
    pub fn from_totals(key: FlowKey, start: f64, end: f64, total_bytes: u64, packet_count: u64) -> Self {
        let avg_pkt_size = if packet_count > 0 {
            total_bytes as f64 / packet_count as f64
        } else {
            0.0
        };

        Self {
            key,
            start,
            end,
            duration: (end - start).max(0.0),
            total_bytes,
            packet_count,
            avg_pkt_size,
        }
    }

    pub fn src_label(&self) -> String {
        self.key.src.to_string()
    }

    pub fn dst_label(&self) -> String {
        self.key.dst.to_string()
    }

    pub fn proto_label(&self) -> String {
        self.key.protocol.label()
    }
}
