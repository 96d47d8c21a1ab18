//! Command arbiter: the single consumer of the link state.
//!
//! Each cycle picks exactly one of, in priority order: shutdown, repeat the
//! held key, send the release (two stop packets, once per release), or wait
//! for a wake and drain the queue on a flush.

use std::io;
use std::thread::{self, JoinHandle};

use lego_ir_protocol::{KeyMask, Packet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::TxOutcome;
use crate::link::{Action, LinkHandle};
use crate::transmitter::{SymbolPeripheral, Transmitter};

/// Number of stop packets sent on every release.
pub const RELEASE_STOP_PACKETS: usize = 2;

/// Receives the outcome of every flush.
pub trait OutcomeSink: Send {
    fn publish(&self, outcome: TxOutcome);
}

impl<F> OutcomeSink for F
where
    F: Fn(TxOutcome) + Send,
{
    fn publish(&self, outcome: TxOutcome) {
        self(outcome);
    }
}

/// What one arbiter cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Sent one packet for the held keys.
    Held { key: KeyMask },
    /// Sent the stop packets after a release.
    Released,
    /// Sent the queued batch.
    Flushed { packets: usize, outcome: TxOutcome },
    /// Woke without work to do.
    Continued,
    Shutdown,
}

/// Counters kept across the arbiter's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArbiterStats {
    pub held_packets: u64,
    pub releases: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub tx_errors: u64,
    /// Packets the encoder emitted, including ones whose burst later failed.
    pub done_packets: u64,
}

pub struct Arbiter<P> {
    link: LinkHandle,
    tx: Transmitter<P>,
    sink: Box<dyn OutcomeSink>,
    stats: ArbiterStats,
}

impl<P: SymbolPeripheral> Arbiter<P> {
    pub fn new(
        config: &ControllerConfig,
        link: LinkHandle,
        peripheral: P,
        sink: impl OutcomeSink + 'static,
    ) -> Self {
        Self {
            link,
            tx: Transmitter::new(peripheral, config.mem_block_symbols, config.tx_timeout()),
            sink: Box::new(sink),
            stats: ArbiterStats::default(),
        }
    }

    pub fn link(&self) -> &LinkHandle {
        &self.link
    }

    pub fn stats(&self) -> ArbiterStats {
        ArbiterStats {
            done_packets: self.tx.done_packets(),
            ..self.stats
        }
    }

    pub fn transmitter(&self) -> &Transmitter<P> {
        &self.tx
    }

    /// Runs one cycle. Blocks only while idle or while a transmission completes.
    pub fn step(&mut self) -> Cycle {
        match self.link.next_action() {
            Action::Shutdown => Cycle::Shutdown,
            Action::Hold { key, channel } => {
                let packet = Packet::new(key, channel);
                self.stats.held_packets += 1;
                match self.tx.transmit(&[packet]) {
                    Ok(()) => debug!(%packet, "sent held key"),
                    Err(err) => {
                        self.stats.tx_errors += 1;
                        warn!(%packet, error = %err, "held key transmission failed");
                    }
                }
                Cycle::Held { key }
            }
            Action::Release { channel } => {
                let stops = [Packet::stop(channel); RELEASE_STOP_PACKETS];
                self.stats.releases += 1;
                match self.tx.transmit(&stops) {
                    Ok(()) => info!(channel = channel + 1, "sent release"),
                    Err(err) => {
                        self.stats.tx_errors += 1;
                        warn!(channel = channel + 1, error = %err, "release transmission failed");
                    }
                }
                Cycle::Released
            }
            Action::Flush { batch } => {
                if batch.is_empty() {
                    warn!("flush woke with an empty queue");
                    return Cycle::Continued;
                }
                let result = self.tx.transmit(&batch);
                let outcome = TxOutcome::from_result(&result);
                self.stats.flushes += 1;
                match &result {
                    Ok(()) => info!(packets = batch.len(), "sent queued packets"),
                    Err(err) => {
                        self.stats.flush_failures += 1;
                        warn!(packets = batch.len(), error = %err, %outcome, "flush failed");
                    }
                }
                self.sink.publish(outcome);
                Cycle::Flushed {
                    packets: batch.len(),
                    outcome,
                }
            }
            Action::Continue => Cycle::Continued,
        }
    }

    /// Runs cycles until the link is shut down.
    pub fn run(&mut self) -> ArbiterStats {
        info!(channel = self.link.channel() + 1, "arbiter started");
        while self.step() != Cycle::Shutdown {}
        info!(
            done_packets = self.tx.done_packets(),
            flushes = self.stats.flushes,
            "arbiter stopped"
        );
        self.stats()
    }
}

impl<P: SymbolPeripheral + 'static> Arbiter<P> {
    /// Moves the arbiter onto a named thread running [`Arbiter::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(mut self) -> io::Result<JoinHandle<ArbiterStats>> {
        thread::Builder::new()
            .name("lego-arbiter".to_string())
            .spawn(move || self.run())
    }
}
