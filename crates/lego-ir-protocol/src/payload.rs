//! Byte layout of append payloads.
//!
//! An append payload is a flat array of packets, two bytes each, low byte
//! first. A trailing odd byte cannot form a packet and is dropped.

use crate::packet::{PACKET_BYTES, Packet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendPayload {
    pub packets: Vec<Packet>,
    /// Bytes after the last whole packet that were discarded.
    pub trailing_bytes: usize,
}

/// Splits a payload into packets. Packets are taken as-is; the arbiter
/// rewrites their channel and the encoder normalizes them on transmission.
pub fn decode_append_payload(bytes: &[u8]) -> AppendPayload {
    let chunks = bytes.chunks_exact(PACKET_BYTES);
    let trailing_bytes = chunks.remainder().len();
    let packets = chunks
        .filter_map(|chunk| <[u8; PACKET_BYTES]>::try_from(chunk).ok())
        .map(|pair| Packet::from_raw(u16::from_le_bytes(pair)))
        .collect();

    AppendPayload {
        packets,
        trailing_bytes,
    }
}

/// Inverse of [`decode_append_payload`].
pub fn encode_append_payload(packets: &[Packet]) -> Vec<u8> {
    packets
        .iter()
        .flat_map(|packet| packet.raw().to_le_bytes())
        .collect()
}
