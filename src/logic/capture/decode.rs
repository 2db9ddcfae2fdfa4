//! Frame decoding with etherparse.
//!
//! Only the fields flow aggregation needs are extracted: addresses, ports and
//! the IP protocol number. No payload inspection happens here.

use std::net::IpAddr;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};

use super::packet::PacketObservation;
use crate::logic::flow::key::Protocol;

/// Link layer of the frames being decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// Frames start directly with an IPv4/IPv6 header
    RawIp,
}

/// Decode an Ethernet frame.
///
/// Returns `None` when the frame cannot be sliced at all. Well-formed non-IP
/// frames come back as an observation without an L3 header.
pub fn decode_frame(timestamp: f64, wire_len: u32, frame: &[u8]) -> Option<PacketObservation> {
    decode(timestamp, wire_len, frame, LinkLayer::Ethernet)
}

/// Decode a frame of the given link type
pub fn decode(timestamp: f64, wire_len: u32, frame: &[u8], link: LinkLayer) -> Option<PacketObservation> {
    let sliced = match link {
        LinkLayer::Ethernet => SlicedPacket::from_ethernet(frame),
        LinkLayer::RawIp => SlicedPacket::from_ip(frame),
    };

    let sliced = match sliced {
        Ok(s) => s,
        Err(e) => {
            log::debug!("Skipping undecodable frame ({} bytes): {}", frame.len(), e);
            return None;
        }
    };

    let (src, dst, protocol) = match &sliced.net {
        Some(NetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                Protocol::from_ip_number(ipv4.payload().ip_number.0),
            )
        }
        Some(NetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            // Past any extension headers, not the base header's next_header
            (
                IpAddr::from(header.source_addr()),
                IpAddr::from(header.destination_addr()),
                Protocol::from_ip_number(ipv6.payload().ip_number.0),
            )
        }
        _ => return Some(PacketObservation::non_ip(timestamp, wire_len)),
    };

    let ports = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => Some((tcp.source_port(), tcp.destination_port())),
        Some(TransportSlice::Udp(udp)) => Some((udp.source_port(), udp.destination_port())),
        _ => None,
    };

    Some(PacketObservation::ip(timestamp, wire_len, src, dst, protocol, ports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn tcp_frame(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 1, 1], [192, 168, 1, 2], 64)
            .tcp(40000, 443, 1, 1024);
        let mut out = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut out, payload).unwrap();
        out
    }

    fn udp_frame() -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 53], 64)
            .udp(5353, 53);
        let mut out = Vec::with_capacity(builder.size(4));
        builder.write(&mut out, &[1, 2, 3, 4]).unwrap();
        out
    }

    #[test]
    fn test_decode_tcp_frame() {
        let frame = tcp_frame(b"hello");
        let obs = decode_frame(1.5, frame.len() as u32, &frame).unwrap();

        let ip = obs.ip.unwrap();
        assert_eq!(ip.src, "192.168.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(ip.dst, "192.168.1.2".parse::<IpAddr>().unwrap());
        assert_eq!(obs.protocol, Protocol::Tcp);

        let ports = obs.ports.unwrap();
        assert_eq!((ports.src, ports.dst), (40000, 443));
        assert_eq!(obs.length as usize, frame.len());
    }

    #[test]
    fn test_decode_udp_frame() {
        let frame = udp_frame();
        let obs = decode_frame(0.0, frame.len() as u32, &frame).unwrap();
        assert_eq!(obs.protocol, Protocol::Udp);
        assert_eq!(obs.ports.unwrap().dst, 53);
    }

    #[test]
    fn test_ipv6_extension_header_keeps_transport() {
        // Base header -> hop-by-hop options -> UDP 5353 -> 53
        let mut packet = vec![0x60, 0, 0, 0, 0, 16, 0, 64];
        packet.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        packet.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        packet.extend_from_slice(&[17, 0, 1, 4, 0, 0, 0, 0]);
        packet.extend_from_slice(&[0x14, 0xe9, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);

        let obs = decode(0.0, packet.len() as u32, &packet, LinkLayer::RawIp).unwrap();
        assert_eq!(obs.protocol, Protocol::Udp);

        let ports = obs.ports.unwrap();
        assert_eq!((ports.src, ports.dst), (5353, 53));
    }

    #[test]
    fn test_non_ip_frame_has_no_l3() {
        // Ethernet header with the LLDP ethertype and a zeroed body
        let mut frame = vec![0xff; 12];
        frame.extend_from_slice(&[0x88, 0xcc]);
        frame.extend_from_slice(&[0u8; 28]);

        let obs = decode_frame(0.0, frame.len() as u32, &frame).unwrap();
        assert!(!obs.has_l3());
    }

    #[test]
    fn test_truncated_frame_is_skipped() {
        assert!(decode_frame(0.0, 3, &[0x00, 0x01, 0x02]).is_none());
    }
}
