//! Drives the pulse encoder into a transmit peripheral.

use std::time::Duration;

use lego_ir_protocol::{Packet, PulseEncoder, Symbol};
use tracing::{debug, warn};

use crate::error::TxError;

/// A timing-capable transmit peripheral.
///
/// `write` queues a block of symbols; `wait_done` blocks until everything
/// written so far has left the LED, or the timeout expires.
pub trait SymbolPeripheral: Send {
    /// # Errors
    ///
    /// Returns an error if the peripheral rejects the block.
    fn write(&mut self, symbols: &[Symbol]) -> Result<(), TxError>;

    /// # Errors
    ///
    /// Returns [`TxError::Timeout`] if transmission does not finish in time,
    /// or another error if the peripheral fails.
    fn wait_done(&mut self, timeout: Duration) -> Result<(), TxError>;
}

/// Sole owner of the transmit peripheral.
#[derive(Debug)]
pub struct Transmitter<P> {
    peripheral: P,
    encoder: PulseEncoder,
    block: Vec<Symbol>,
    timeout: Duration,
}

impl<P: SymbolPeripheral> Transmitter<P> {
    pub fn new(peripheral: P, block_symbols: usize, timeout: Duration) -> Self {
        Self {
            peripheral,
            encoder: PulseEncoder::new(),
            block: vec![Symbol::default(); block_symbols],
            timeout,
        }
    }

    /// Sends `packets` as one burst and waits for it to complete.
    ///
    /// # Errors
    ///
    /// Returns [`TxError::InvalidArgument`] for an empty batch, otherwise
    /// whatever the peripheral reports. The encoder is rewound on error.
    pub fn transmit(&mut self, packets: &[Packet]) -> Result<(), TxError> {
        if packets.is_empty() {
            return Err(TxError::invalid_argument("empty packet batch"));
        }
        if self.block.is_empty() {
            return Err(TxError::invalid_argument("zero-sized symbol block"));
        }

        let mut blocks = 0usize;
        loop {
            let progress = self.encoder.encode(packets, &mut self.block);
            let written = self.block.get(..progress.written).unwrap_or_default();
            if let Err(err) = self.peripheral.write(written) {
                warn!(error = %err, blocks, "peripheral rejected symbol block");
                self.encoder.rewind();
                return Err(err);
            }
            blocks += 1;
            if progress.is_complete() {
                break;
            }
        }

        self.peripheral.wait_done(self.timeout)?;
        debug!(
            packets = packets.len(),
            blocks,
            done_packets = self.encoder.done_packets(),
            "transmission complete"
        );
        Ok(())
    }

    /// Packets emitted since the transmitter was created. A batch counts once
    /// the encoder has produced all of its symbols, even if the wait for
    /// completion then fails.
    pub fn done_packets(&self) -> u64 {
        self.encoder.done_packets()
    }

    pub fn last_packet(&self) -> Option<Packet> {
        self.encoder.last_packet()
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }
}
