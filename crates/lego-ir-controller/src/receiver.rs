//! Receive path: capture hand-off and decoding.
//!
//! The hardware-facing side only ever calls [`CaptureSender::try_send`],
//! which never blocks; a full channel drops the capture and counts it. The
//! [`Receiver`] worker owns the decoding.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, TrySendError};
use lego_ir_protocol::{DecodedFrame, Symbol, decode_with_summary};
use serde::Serialize;
use tracing::{debug, info, warn};

/// One received burst of symbols.
pub type Capture = Vec<Symbol>;

/// Consumer of decoded frames.
pub trait FrameSink {
    fn on_frame(&mut self, frame: &DecodedFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(&DecodedFrame),
{
    fn on_frame(&mut self, frame: &DecodedFrame) {
        self(frame);
    }
}

#[derive(Debug, Default)]
struct RxCounters {
    captures: AtomicU64,
    frames: AtomicU64,
    invalid_frames: AtomicU64,
    truncated_frames: AtomicU64,
    dropped_captures: AtomicU64,
}

/// Receive counters, as reported in telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxStats {
    pub captures: u64,
    pub frames: u64,
    pub invalid_frames: u64,
    pub truncated_frames: u64,
    pub dropped_captures: u64,
}

impl RxCounters {
    fn snapshot(&self) -> RxStats {
        RxStats {
            captures: self.captures.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
            invalid_frames: self.invalid_frames.load(Ordering::Relaxed),
            truncated_frames: self.truncated_frames.load(Ordering::Relaxed),
            dropped_captures: self.dropped_captures.load(Ordering::Relaxed),
        }
    }
}

/// Creates the capture hand-off with room for `depth` pending captures.
pub fn capture_channel(depth: usize) -> (CaptureSender, Receiver) {
    let (tx, rx) = channel::bounded(depth);
    let counters = Arc::new(RxCounters::default());
    (
        CaptureSender {
            tx,
            counters: Arc::clone(&counters),
        },
        Receiver { rx, counters },
    )
}

/// Producer side, safe to call from a completion callback.
#[derive(Debug, Clone)]
pub struct CaptureSender {
    tx: channel::Sender<Capture>,
    counters: Arc<RxCounters>,
}

impl CaptureSender {
    /// Hands a capture to the worker. Returns `false` if it was dropped.
    pub fn try_send(&self, capture: Capture) -> bool {
        match self.tx.try_send(capture) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped_captures.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Decode worker.
#[derive(Debug)]
pub struct Receiver {
    rx: channel::Receiver<Capture>,
    counters: Arc<RxCounters>,
}

impl Receiver {
    pub fn stats(&self) -> RxStats {
        self.counters.snapshot()
    }

    /// Decodes one capture, logging and forwarding every frame.
    pub fn process(&self, capture: &[Symbol], sink: &mut impl FrameSink) {
        let summary = decode_with_summary(capture);
        self.counters.captures.fetch_add(1, Ordering::Relaxed);
        self.counters
            .frames
            .fetch_add(summary.frames.len() as u64, Ordering::Relaxed);
        self.counters
            .invalid_frames
            .fetch_add(summary.invalid as u64, Ordering::Relaxed);
        self.counters
            .truncated_frames
            .fetch_add(summary.truncated as u64, Ordering::Relaxed);

        debug!(
            symbols = capture.len(),
            frames = summary.frames.len(),
            skipped = summary.skipped_symbols,
            truncated = summary.truncated,
            "capture decoded"
        );

        for frame in &summary.frames {
            match frame.packet.verify() {
                Ok(()) => info!(offset = frame.offset, packet = %frame.packet, "received frame"),
                Err(err) if frame.valid => {
                    warn!(offset = frame.offset, packet = %frame.packet, error = %err, "received malformed frame");
                }
                Err(_) => warn!(
                    offset = frame.offset,
                    packet = %frame.packet,
                    expected_checksum = frame.packet.expected_checksum(),
                    received_checksum = frame.packet.checksum(),
                    "received frame with bad checksum"
                ),
            }
            sink.on_frame(frame);
        }
    }

    /// Processes captures until every [`CaptureSender`] is dropped.
    pub fn run(self, mut sink: impl FrameSink) -> RxStats {
        while let Ok(capture) = self.rx.recv() {
            self.process(&capture, &mut sink);
        }
        let stats = self.stats();
        info!(
            captures = stats.captures,
            frames = stats.frames,
            invalid = stats.invalid_frames,
            dropped = stats.dropped_captures,
            "receiver stopped"
        );
        stats
    }

    /// Moves the worker onto a named thread running [`Receiver::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(self, sink: impl FrameSink + Send + 'static) -> io::Result<JoinHandle<RxStats>> {
        thread::Builder::new()
            .name("lego-receiver".to_string())
            .spawn(move || self.run(sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lego_ir_protocol::{KeyMask, Packet, PulseEncoder, frame_symbols};

    #[test]
    fn test_process_forwards_every_frame() {
        let (_tx, rx) = capture_channel(1);
        let packets = [Packet::new(KeyMask::LEFT_FORWARD, 0), Packet::stop(0)];
        let capture = PulseEncoder::new().encode_all(&packets);

        let mut seen = Vec::new();
        rx.process(&capture, &mut |frame: &DecodedFrame| seen.push(frame.packet));

        assert_eq!(seen, packets.to_vec());
        assert_eq!(rx.stats().frames, 2);
        assert_eq!(rx.stats().captures, 1);
    }

    #[test]
    fn test_invalid_frames_are_counted_and_forwarded() {
        let (_tx, rx) = capture_channel(1);
        let mut capture = frame_symbols(Packet::stop(0)).to_vec();
        // flip the last data bit
        if let Some(symbol) = capture.get_mut(16) {
            symbol.space_us = if symbol.bit_value() { 263 } else { 553 };
        }

        let mut valid = Vec::new();
        rx.process(&capture, &mut |frame: &DecodedFrame| valid.push(frame.valid));

        assert_eq!(valid, vec![false]);
        assert_eq!(rx.stats().invalid_frames, 1);
    }

    #[test]
    fn test_full_channel_drops_capture() {
        let (tx, rx) = capture_channel(1);
        assert!(tx.try_send(frame_symbols(Packet::stop(0)).to_vec()));
        assert!(!tx.try_send(frame_symbols(Packet::stop(1)).to_vec()));
        assert_eq!(rx.stats().dropped_captures, 1);
    }

    #[test]
    fn test_run_exits_when_senders_drop() {
        let (tx, rx) = capture_channel(4);
        assert!(tx.try_send(frame_symbols(Packet::stop(2)).to_vec()));
        drop(tx);

        let mut frames = Vec::new();
        let stats = rx.run(|frame: &DecodedFrame| frames.push(frame.packet));
        assert_eq!(stats.frames, 1);
        assert_eq!(frames, vec![Packet::stop(2)]);
    }
}
