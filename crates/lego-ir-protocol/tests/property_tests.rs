//! Property-based tests for the packet checksum and the pulse codec.
//!
//! Uses proptest with 500 cases per property.

use lego_ir_protocol::{
    KeyMask, PACKET_BITS, Packet, PulseEncoder, SYMBOLS_PER_FRAME, Symbol, checksum, decode,
    decode_with_summary, frame_symbols, timing,
};
use proptest::prelude::*;

fn any_packet() -> impl Strategy<Value = Packet> {
    (0u8..=0x0F, 0u8..=7).prop_map(|(key, channel)| Packet::new(KeyMask::from_nibble(key), channel))
}

/// Re-times a clean frame with receiver-side jitter that stays inside the
/// decoder's windows.
fn jittered(frame: &[Symbol], jitter: &[u16]) -> Vec<Symbol> {
    frame
        .iter()
        .zip(jitter.iter().cycle())
        .map(|(symbol, &j)| {
            let space = if symbol.is_start() {
                800 + j % 300
            } else if symbol.bit_value() && symbol.space_us < 1000 {
                320 + j % 380
            } else if symbol.space_us < 320 {
                150 + j % 170
            } else {
                symbol.space_us
            };
            Symbol::new(symbol.mark_us, space)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The checksum never depends on the checksum field itself.
    #[test]
    fn prop_checksum_ignores_low_nibble(raw in any::<u16>(), low in 0u16..=0x0F) {
        prop_assert_eq!(checksum(raw), checksum((raw & 0xFFF0) | low));
    }

    /// Any single bit flip in a valid packet breaks the checksum.
    #[test]
    fn prop_single_bit_flip_is_detected(packet in any_packet(), bit in 0u32..16) {
        let flipped = Packet::from_raw(packet.raw() ^ (1 << bit));
        prop_assert!(!flipped.is_valid());
    }

    /// Encoded batches decode to the same packets, in order.
    #[test]
    fn prop_encode_decode_roundtrip(packets in prop::collection::vec(any_packet(), 1..12)) {
        let symbols = PulseEncoder::new().encode_all(&packets);
        prop_assert_eq!(symbols.len(), packets.len() * SYMBOLS_PER_FRAME);

        let decoded: Vec<Packet> = decode(&symbols).into_iter().map(|f| f.packet).collect();
        prop_assert_eq!(decoded, packets);
    }

    /// The symbol stream does not depend on how the output is split into blocks.
    #[test]
    fn prop_block_size_does_not_change_output(
        packets in prop::collection::vec(any_packet(), 1..6),
        block_len in 1usize..40,
    ) {
        let expected = PulseEncoder::new().encode_all(&packets);

        let mut encoder = PulseEncoder::new();
        let mut block = vec![Symbol::default(); block_len];
        let mut collected = Vec::with_capacity(expected.len());
        let mut calls = 0usize;
        loop {
            let progress = encoder.encode(&packets, &mut block);
            collected.extend(block.iter().take(progress.written).copied());
            calls += 1;
            if progress.is_complete() {
                break;
            }
            prop_assert!(calls <= expected.len(), "encoder stopped making progress");
        }

        prop_assert_eq!(collected, expected);
        prop_assert_eq!(encoder.done_packets(), packets.len() as u64);
    }

    /// Timing jitter inside the windows does not change the decoded packet.
    #[test]
    fn prop_decoder_tolerates_jitter(
        packet in any_packet(),
        jitter in prop::collection::vec(any::<u16>(), SYMBOLS_PER_FRAME),
    ) {
        let noisy = jittered(&frame_symbols(packet), &jitter);
        let frames = decode(&noisy);
        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames.first().map(|f| f.packet), Some(packet));
    }

    /// Arbitrary captures never yield more frames than they can hold.
    #[test]
    fn prop_decoder_is_total(spaces in prop::collection::vec(0u16..2000, 0..200)) {
        let symbols: Vec<Symbol> = spaces
            .iter()
            .map(|&space| Symbol::new(timing::MARK_US, space))
            .collect();
        let summary = decode_with_summary(&symbols);
        prop_assert!(summary.frames.len() <= symbols.len() / (PACKET_BITS + 1));
        prop_assert!(summary.invalid <= summary.frames.len());
        prop_assert!(summary.truncated <= 1);
    }
}
