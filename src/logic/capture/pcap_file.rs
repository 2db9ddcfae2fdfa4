//! Offline capture reader (cargo feature `pcap`).

use std::path::Path;

use pcap::{Capture, Linktype};

use super::decode::{decode, LinkLayer};
use super::packet::PacketObservation;
use crate::logic::error::{Result, SentinelError};

/// Read every frame of a pcap/pcapng file into packet observations.
///
/// Frames that cannot be decoded are skipped; they never abort the read.
pub fn read_pcap(path: &Path) -> Result<Vec<PacketObservation>> {
    if !path.exists() {
        return Err(SentinelError::Input(format!("Capture file not found: {}", path.display())));
    }

    let mut cap = Capture::from_file(path)
        .map_err(|e| SentinelError::Input(format!("Failed to open {}: {}", path.display(), e)))?;

    let link = match cap.get_datalink() {
        Linktype::ETHERNET => LinkLayer::Ethernet,
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => LinkLayer::RawIp,
        other => {
            return Err(SentinelError::Input(format!(
                "Unsupported link type {:?} in {}",
                other,
                path.display()
            )))
        }
    };

    let mut observations = Vec::new();
    let mut skipped = 0usize;

    loop {
        let packet = match cap.next_packet() {
            Ok(p) => p,
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => {
                return Err(SentinelError::Input(format!(
                    "Failed reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let ts = packet.header.ts.tv_sec as f64 + packet.header.ts.tv_usec as f64 / 1_000_000.0;
        match decode(ts, packet.header.len, packet.data, link) {
            Some(obs) => observations.push(obs),
            None => skipped += 1,
        }
    }

    log::info!(
        "Read {} packets from {} ({} undecodable)",
        observations.len(),
        path.display(),
        skipped
    );
    Ok(observations)
}
