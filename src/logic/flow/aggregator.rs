//! Flow Aggregator
//!
//! Groups packet observations into flows keyed by the exact 5-tuple in a
//! single pass over the batch. There is no windowing and no direction merging.

use std::collections::HashMap;

use super::key::FlowKey;
use super::record::FlowRecord;
use crate::logic::capture::PacketObservation;

/// Running totals for one key
#[derive(Debug, Clone, Copy)]
struct FlowAccumulator {
    start: f64,
    end: f64,
    total_bytes: u64,
    packet_count: u64,
}

impl FlowAccumulator {
    fn new(ts: f64, length: u32) -> Self {
        Self {
            start: ts,
            end: ts,
            total_bytes: length as u64,
            packet_count: 1,
        }
    }

    fn add(&mut self, ts: f64, length: u32) {
        self.start = self.start.min(ts);
        self.end = self.end.max(ts);
        self.total_bytes += length as u64;
        self.packet_count += 1;
    }
}

/// Aggregation counters for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub packets_seen: usize,
    pub packets_dropped: usize,
    pub flows: usize,
}

/// Batch 5-tuple flow aggregator
#[derive(Debug, Default)]
pub struct FlowAggregator {
    flows: HashMap<FlowKey, FlowAccumulator>,
    stats: AggregationStats,
}

impl FlowAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one packet into its flow. Packets without an IP header are dropped.
    pub fn observe(&mut self, packet: &PacketObservation) {
        self.stats.packets_seen += 1;

        let Some(ip) = packet.ip else {
            self.stats.packets_dropped += 1;
            return;
        };

        let (sport, dport) = match (packet.protocol.has_ports(), packet.ports) {
            (true, Some(ports)) => (ports.src, ports.dst),
            _ => (0, 0),
        };

        let key = FlowKey::new(ip.src, sport, ip.dst, dport, packet.protocol);

        self.flows
            .entry(key)
            .and_modify(|acc| acc.add(packet.timestamp, packet.length))
            .or_insert_with(|| FlowAccumulator::new(packet.timestamp, packet.length));
    }

    /// Consume the aggregator and emit one record per key (unordered)
    pub fn finish(mut self) -> (Vec<FlowRecord>, AggregationStats) {
        self.stats.flows = self.flows.len();

        let records = self
            .flows
            .into_iter()
            .map(|(key, acc)| {
                FlowRecord::from_totals(key, acc.start, acc.end, acc.total_bytes, acc.packet_count)
            })
            .collect();

        (records, self.stats)
    }
}

/// Aggregate a whole packet batch into flow records
pub fn aggregate<'a>(packets: impl IntoIterator<Item = &'a PacketObservation>) -> Vec<FlowRecord> {
    let mut aggregator = FlowAggregator::new();
    for packet in packets {
        aggregator.observe(packet);
    }

    let (records, stats) = aggregator.finish();
    if records.is_empty() {
        log::info!(
            "No flows extracted ({} packets seen, {} without IP header)",
            stats.packets_seen,
            stats.packets_dropped
        );
    } else {
        log::debug!(
            "Aggregated {} packets into {} flows ({} dropped)",
            stats.packets_seen,
            stats.flows,
            stats.packets_dropped
        );
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::flow::key::Protocol;
    use std::net::IpAddr;

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn tcp(ts: f64, len: u32, src: &str, sport: u16, dst: &str, dport: u16) -> PacketObservation {
        PacketObservation::ip(ts, len, addr(src), addr(dst), Protocol::Tcp, Some((sport, dport)))
    }

    #[test]
    fn test_single_tcp_flow_totals() {
        let packets = vec![
            tcp(10.0, 100, "1.1.1.1", 1234, "2.2.2.2", 80),
            tcp(10.5, 300, "1.1.1.1", 1234, "2.2.2.2", 80),
            tcp(10.2, 200, "1.1.1.1", 1234, "2.2.2.2", 80),
            tcp(11.0, 400, "1.1.1.1", 1234, "2.2.2.2", 80),
        ];

        let flows = aggregate(&packets);
        assert_eq!(flows.len(), 1);

        let flow = &flows[0];
        assert_eq!(flow.start, 10.0);
        assert_eq!(flow.end, 11.0);
        assert_eq!(flow.duration, 1.0);
        assert_eq!(flow.total_bytes, 1000);
        assert_eq!(flow.packet_count, 4);
        assert_eq!(flow.avg_pkt_size, 250.0);
        assert_eq!(flow.proto_label(), "TCP");
    }

    #[test]
    fn test_reverse_direction_is_separate_flow() {
        let packets = vec![
            tcp(1.0, 60, "1.1.1.1", 1234, "2.2.2.2", 80),
            tcp(1.1, 1500, "2.2.2.2", 80, "1.1.1.1", 1234),
        ];

        let flows = aggregate(&packets);
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|f| f.packet_count == 1));
    }

    #[test]
    fn test_non_ip_packets_yield_no_flows() {
        let packets: Vec<_> = (0..5).map(|i| PacketObservation::non_ip(i as f64, 64)).collect();

        let mut aggregator = FlowAggregator::new();
        packets.iter().for_each(|p| aggregator.observe(p));
        let (flows, stats) = aggregator.finish();

        assert!(flows.is_empty());
        assert_eq!(stats.packets_seen, 5);
        assert_eq!(stats.packets_dropped, 5);
    }

    #[test]
    fn test_icmp_uses_zero_ports_and_numeric_label() {
        let packets = vec![
            PacketObservation::ip(0.0, 98, addr("10.0.0.1"), addr("10.0.0.2"), Protocol::Other(1), None),
            PacketObservation::ip(1.0, 98, addr("10.0.0.1"), addr("10.0.0.2"), Protocol::Other(1), None),
        ];

        let flows = aggregate(&packets);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].key.sport, 0);
        assert_eq!(flows[0].key.dport, 0);
        assert_eq!(flows[0].proto_label(), "1");
    }

    #[test]
    fn test_flow_invariants_hold() {
        let mut packets = Vec::new();
        for i in 0..200u32 {
            let sport = 1000 + (i % 7) as u16;
            let ts = ((i * 37) % 101) as f64 * 0.13;
            packets.push(tcp(ts, 40 + (i * 13) % 1460, "10.1.1.1", sport, "10.2.2.2", 443));
        }
        packets.push(PacketObservation::non_ip(3.0, 42));

        let flows = aggregate(&packets);
        assert_eq!(flows.len(), 7);

        for flow in &flows {
            assert!(flow.packet_count >= 1);
            assert!(flow.duration >= 0.0);
            let rebuilt = flow.avg_pkt_size * flow.packet_count as f64;
            assert!((rebuilt - flow.total_bytes as f64).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_input() {
        let packets: Vec<PacketObservation> = Vec::new();
        assert!(aggregate(&packets).is_empty());
    }
}
