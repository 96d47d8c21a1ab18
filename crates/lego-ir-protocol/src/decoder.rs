//! Pulse-to-packet decoder for received captures.
//!
//! Captures are scanned left to right. A symbol whose space falls in the
//! start window opens a frame and the following 16 symbols are read as data
//! bits, first symbol into bit 15. Anything else is skipped one symbol at a
//! time. Frames that fail the checksum are still reported, flagged invalid.

use tracing::{debug, trace};

use crate::packet::{PACKET_BITS, Packet};
use crate::timing::Symbol;

/// One frame found in a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Index of the start symbol inside the capture.
    pub offset: usize,
    pub packet: Packet,
    /// Checksum matched.
    pub valid: bool,
}

/// Frames plus counters describing what else was in the capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    pub frames: Vec<DecodedFrame>,
    pub invalid: usize,
    /// Start symbols with fewer than 16 symbols after them.
    pub truncated: usize,
    /// Symbols outside any frame.
    pub skipped_symbols: usize,
}

impl DecodeSummary {
    pub fn valid(&self) -> usize {
        self.frames.len() - self.invalid
    }
}

/// Decodes every frame in `symbols`.
pub fn decode(symbols: &[Symbol]) -> Vec<DecodedFrame> {
    decode_with_summary(symbols).frames
}

/// Decodes every frame in `symbols` and counts what was skipped.
pub fn decode_with_summary(symbols: &[Symbol]) -> DecodeSummary {
    let mut summary = DecodeSummary::default();
    let mut index = 0usize;

    while let Some(symbol) = symbols.get(index) {
        if !symbol.is_start() {
            summary.skipped_symbols += 1;
            index += 1;
            continue;
        }

        let data_start = index + 1;
        let Some(bits) = symbols.get(data_start..data_start + PACKET_BITS) else {
            debug!(
                offset = index,
                available = symbols.len() - data_start,
                "truncated frame at end of capture"
            );
            summary.truncated += 1;
            summary.skipped_symbols += symbols.len() - index;
            break;
        };

        let raw = bits
            .iter()
            .fold(0u16, |acc, s| (acc << 1) | u16::from(s.bit_value()));
        let packet = Packet::from_raw(raw);
        let valid = packet.is_valid();
        trace!(offset = index, raw = format_args!("{raw:#06x}"), valid, "decoded frame");

        if !valid {
            summary.invalid += 1;
        }
        summary.frames.push(DecodedFrame {
            offset: index,
            packet,
            valid,
        });
        index = data_start + PACKET_BITS;
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::frame_symbols;
    use crate::packet::KeyMask;
    use crate::timing::{BIT_0, BIT_1, END, START};

    #[test]
    fn test_decodes_encoded_frame() {
        let packet = Packet::new(KeyMask::LEFT_FORWARD, 0);
        let frames = decode(&frame_symbols(packet));
        assert_eq!(
            frames,
            vec![DecodedFrame {
                offset: 0,
                packet,
                valid: true
            }]
        );
    }

    #[test]
    fn test_noise_before_start_is_skipped() {
        let mut symbols = vec![BIT_1, END, Symbol::new(158, 700)];
        symbols.extend_from_slice(&frame_symbols(Packet::stop(1)));

        let summary = decode_with_summary(&symbols);
        assert_eq!(summary.frames.len(), 1);
        assert_eq!(summary.frames.first().map(|f| f.offset), Some(3));
        // three noise symbols plus the trailing end symbol
        assert_eq!(summary.skipped_symbols, 4);
    }

    #[test]
    fn test_all_zero_frame_is_invalid() {
        let mut symbols = vec![START];
        symbols.extend(std::iter::repeat_n(BIT_0, 16));

        let summary = decode_with_summary(&symbols);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.valid(), 0);
        assert_eq!(summary.frames.first().map(|f| f.packet.raw()), Some(0));
    }

    #[test]
    fn test_truncated_frame_is_counted_not_read() {
        let frame = frame_symbols(Packet::stop(0));
        let cut = frame.get(..10).unwrap_or_default();

        let summary = decode_with_summary(cut);
        assert!(summary.frames.is_empty());
        assert_eq!(summary.truncated, 1);
    }

    #[test]
    fn test_empty_capture() {
        assert_eq!(decode_with_summary(&[]), DecodeSummary::default());
    }
}
