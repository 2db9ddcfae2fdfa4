//! Capture Module - Packet observations from frames and capture files
//!
//! - `packet.rs` - PacketObservation handed to the flow aggregator
//! - `decode.rs` - etherparse-based frame decoding
//! - `pcap_file.rs` - Offline capture reader (feature `pcap`)

pub mod packet;
pub mod decode;

#[cfg(feature = "pcap")]
pub mod pcap_file;

pub use packet::{IpPair, PacketObservation, PortPair};
pub use decode::{decode, decode_frame, LinkLayer};

#[cfg(feature = "pcap")]
pub use pcap_file::read_pcap;
