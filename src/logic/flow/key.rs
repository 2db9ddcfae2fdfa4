//! Flow identity: protocol tag and 5-tuple key.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::logic::error::SentinelError;

/// IANA protocol numbers the pipeline distinguishes
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// Transport protocol of a flow.
///
/// Anything that is neither TCP nor UDP keeps its raw IP protocol number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Other(u8),
}

impl Protocol {
    /// Map the IP header's protocol / next-header field
    pub fn from_ip_number(number: u8) -> Self {
        match number {
            IPPROTO_TCP => Protocol::Tcp,
            IPPROTO_UDP => Protocol::Udp,
            other => Protocol::Other(other),
        }
    }

    /// Label used in flow rows and alert records ("TCP", "UDP", "1", ...)
    pub fn label(&self) -> String {
        match self {
            Protocol::Tcp => "TCP".to_string(),
            Protocol::Udp => "UDP".to_string(),
            Protocol::Other(n) => n.to_string(),
        }
    }

    /// Categorical encoding used as the `proto_num` feature
    pub fn proto_num(&self) -> f32 {
        match self {
            Protocol::Tcp => 1.0,
            Protocol::Udp => 2.0,
            Protocol::Other(_) => 0.0,
        }
    }

    /// Whether packets of this protocol carry a port pair
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Protocol {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("TCP") {
            return Ok(Protocol::Tcp);
        }
        if trimmed.eq_ignore_ascii_case("UDP") {
            return Ok(Protocol::Udp);
        }
        trimmed
            .parse::<u8>()
            .map(Protocol::from_ip_number)
            .map_err(|_| SentinelError::Input(format!("Unknown protocol label: {:?}", s)))
    }
}

/// Exact 5-tuple identity of a unidirectional flow.
///
/// A→B and B→A are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src: IpAddr,
    pub sport: u16,
    pub dst: IpAddr,
    pub dport: u16,
    pub protocol: Protocol,
}

impl FlowKey {
    pub fn new(src: IpAddr, sport: u16, dst: IpAddr, dport: u16, protocol: Protocol) -> Self {
        // Portless protocols always key on 0/0
        let (sport, dport) = if protocol.has_ports() { (sport, dport) } else { (0, 0) };
        Self { src, sport, dst, dport, protocol }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} [{}]",
            self.src, self.sport, self.dst, self.dport, self.protocol
        )
    }
}

impl Serialize for FlowKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("FlowKey", 5)?;
        state.serialize_field("src", &self.src)?;
        state.serialize_field("sport", &self.sport)?;
        state.serialize_field("dst", &self.dst)?;
        state.serialize_field("dport", &self.dport)?;
        state.serialize_field("proto", &self.protocol.label())?;
        state.end()
    }
}
