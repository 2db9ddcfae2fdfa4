//! Flow Module - Packet → flow aggregation
//!
//! - `key.rs` - Protocol tag and 5-tuple FlowKey
//! - `record.rs` - FlowRecord summary
//! - `aggregator.rs` - Single-pass batch aggregation
//! - `table.rs` - Flow rows as CSV

pub mod key;
pub mod record;
pub mod aggregator;
pub mod table;

pub use key::{FlowKey, Protocol};
pub use record::FlowRecord;
pub use aggregator::{aggregate, AggregationStats, FlowAggregator};
pub use table::{read_flows_csv, write_flows_csv};
