//! Packet observation handed from capture to flow aggregation.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::logic::flow::key::Protocol;

/// L3 address pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPair {
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// L4 port pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    pub src: u16,
    pub dst: u16,
}

/// One observed packet.
///
/// `ip` is `None` for frames without an IP header (ARP, LLDP, ...); the
/// aggregator drops those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketObservation {
    /// Capture time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Frame length on the wire
    pub length: u32,
    pub ip: Option<IpPair>,
    pub ports: Option<PortPair>,
    pub protocol: Protocol,
}

impl PacketObservation {
    /// Observation for an IP packet
    pub fn ip(
        timestamp: f64,
        length: u32,
        src: IpAddr,
        dst: IpAddr,
        protocol: Protocol,
        ports: Option<(u16, u16)>,
    ) -> Self {
        Self {
            timestamp,
            length,
            ip: Some(IpPair { src, dst }),
            ports: ports.map(|(src, dst)| PortPair { src, dst }),
            protocol,
        }
    }

    /// Observation for a frame that carries no IP header
    pub fn non_ip(timestamp: f64, length: u32) -> Self {
        Self {
            timestamp,
            length,
            ip: None,
            ports: None,
            protocol: Protocol::Other(0),
        }
    }

    pub fn has_l3(&self) -> bool {
        self.ip.is_some()
    }
}
