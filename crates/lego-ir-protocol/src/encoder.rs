//! Resumable packet-to-pulse encoder.
//!
//! A batch of packets is turned into `START, 16 data symbols, END` per
//! packet. Output goes into caller-provided blocks of arbitrary size; when a
//! block fills up the encoder keeps its cursor and continues exactly where it
//! stopped on the next call.

use tracing::warn;

use crate::packet::{PACKET_BITS, Packet};
use crate::timing::{END, START, SYMBOLS_PER_FRAME, Symbol};

/// Position of the encoder inside the current packet frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderPhase {
    #[default]
    Start,
    Word,
    End,
}

/// Resume point inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderCursor {
    pub phase: EncoderPhase,
    /// Index of the packet currently being sent.
    pub packet_index: usize,
    /// Next data bit to emit while in [`EncoderPhase::Word`].
    pub bit_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    /// Every packet of the batch has been emitted; the cursor is back at the start.
    Complete,
    /// The output block is full; call again with a fresh block.
    MemoryFull,
}

/// Result of one [`PulseEncoder::encode`] call.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    pub written: usize,
    pub state: EncodeState,
}

impl EncodeProgress {
    pub fn is_complete(&self) -> bool {
        self.state == EncodeState::Complete
    }

    const fn complete(written: usize) -> Self {
        Self {
            written,
            state: EncodeState::Complete,
        }
    }

    const fn memory_full(written: usize) -> Self {
        Self {
            written,
            state: EncodeState::MemoryFull,
        }
    }
}

/// Stateful pulse encoder.
///
/// The same batch slice must be passed to every call until
/// [`EncodeState::Complete`] is reported, or [`PulseEncoder::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct PulseEncoder {
    cursor: EncoderCursor,
    done_packets: u64,
    last_packet: Option<Packet>,
}

impl PulseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> EncoderCursor {
        self.cursor
    }

    /// Packets fully emitted over the encoder's lifetime (since the last reset).
    pub fn done_packets(&self) -> u64 {
        self.done_packets
    }

    /// Last packet whose data bits were emitted, as normalized for transmission.
    pub fn last_packet(&self) -> Option<Packet> {
        self.last_packet
    }

    /// Returns the cursor to the start of a batch and clears the running total.
    pub fn reset(&mut self) {
        self.cursor = EncoderCursor::default();
        self.done_packets = 0;
    }

    /// Abandons the batch in flight; the running total is kept.
    pub fn rewind(&mut self) {
        self.cursor = EncoderCursor::default();
    }

    /// Emits symbols for `packets` into `out`, resuming from the cursor.
    pub fn encode(&mut self, packets: &[Packet], out: &mut [Symbol]) -> EncodeProgress {
        if packets.is_empty() {
            self.cursor = EncoderCursor::default();
            return EncodeProgress::complete(0);
        }

        if self.cursor.packet_index >= packets.len() {
            warn!(
                packet_index = self.cursor.packet_index,
                batch_len = packets.len(),
                "encoder cursor past end of batch, restarting batch"
            );
            self.cursor = EncoderCursor::default();
        }

        let mut slots = out.iter_mut();
        let mut written = 0usize;

        loop {
            match self.cursor.phase {
                EncoderPhase::Start => {
                    let Some(slot) = slots.next() else {
                        return EncodeProgress::memory_full(written);
                    };
                    *slot = START;
                    written += 1;
                    self.cursor.phase = EncoderPhase::Word;
                    self.cursor.bit_index = 0;
                }
                EncoderPhase::Word => {
                    let Some(packet) = packets.get(self.cursor.packet_index) else {
                        self.cursor = EncoderCursor::default();
                        return EncodeProgress::complete(written);
                    };
                    let wire = packet.normalized().raw().to_be_bytes();

                    while usize::from(self.cursor.bit_index) < PACKET_BITS {
                        let Some(slot) = slots.next() else {
                            return EncodeProgress::memory_full(written);
                        };
                        *slot = Symbol::bit(wire_bit(wire, self.cursor.bit_index));
                        written += 1;
                        self.cursor.bit_index += 1;
                    }

                    self.last_packet = Some(packet.normalized());
                    self.cursor.phase = EncoderPhase::End;
                }
                EncoderPhase::End => {
                    let Some(slot) = slots.next() else {
                        return EncodeProgress::memory_full(written);
                    };
                    *slot = END;
                    written += 1;
                    self.cursor.packet_index += 1;
                    self.cursor.phase = EncoderPhase::Start;
                    self.cursor.bit_index = 0;

                    if self.cursor.packet_index >= packets.len() {
                        self.done_packets += packets.len() as u64;
                        self.cursor = EncoderCursor::default();
                        return EncodeProgress::complete(written);
                    }
                }
            }
        }
    }

    /// Drives the remaining part of the batch to completion in one buffer.
    pub fn encode_all(&mut self, packets: &[Packet]) -> Vec<Symbol> {
        let mut out = vec![Symbol::default(); packets.len() * SYMBOLS_PER_FRAME];
        let progress = self.encode(packets, &mut out);
        debug_assert!(progress.is_complete());
        out.truncate(progress.written);
        out
    }
}

/// Bit `index` of the on-wire sequence: high byte first, each byte MSB first.
fn wire_bit(wire: [u8; 2], index: u8) -> bool {
    let [high, low] = wire;
    let byte = if index < 8 { high } else { low };
    byte & (0x80 >> (index % 8)) != 0
}

/// The 18 symbols of a single packet frame.
pub fn frame_symbols(packet: Packet) -> [Symbol; SYMBOLS_PER_FRAME] {
    let mut out = [Symbol::default(); SYMBOLS_PER_FRAME];
    let progress = PulseEncoder::new().encode(&[packet], &mut out);
    debug_assert!(progress.is_complete());
    out
}
