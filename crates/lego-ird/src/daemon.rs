//! Wires the link, arbiter and receiver together on host threads.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use lego_ir_controller::{
    Arbiter, ArbiterStats, LinkHandle, LoopbackPeripheral, RecordingPins, RxStats,
    TransportAdapter, TxOutcome, WakeBits, capture_channel,
};
use lego_ir_protocol::DecodedFrame;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;

const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Final counters, logged on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaemonReport {
    pub arbiter: ArbiterStats,
    pub rx: Option<RxStats>,
}

/// A running IR link backed by the loopback peripheral.
pub struct Daemon {
    adapter: TransportAdapter,
    peripheral: LoopbackPeripheral,
    pins: RecordingPins,
    arbiter: JoinHandle<ArbiterStats>,
    receiver: Option<JoinHandle<RxStats>>,
}

impl Daemon {
    /// Starts the arbiter, and the receiver if loopback decoding is enabled.
    /// Flush outcomes are delivered on the returned channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a worker thread
    /// cannot be spawned.
    pub fn start(config: &DaemonConfig) -> Result<(Self, UnboundedReceiver<TxOutcome>)> {
        config.validate()?;
        let controller = &config.controller;

        let link = LinkHandle::new(controller);
        let (receiver, peripheral) = if config.loopback_rx {
            let (capture, receiver) = capture_channel(controller.capture_depth);
            (Some(receiver), LoopbackPeripheral::new().with_capture(capture))
        } else {
            (None, LoopbackPeripheral::new())
        };

        let receiver = receiver
            .map(|receiver| receiver.spawn(|_: &DecodedFrame| {}))
            .transpose()
            .context("Failed to spawn receiver thread")?;

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let sink = move |outcome: TxOutcome| {
            if outcome_tx.send(outcome).is_err() {
                debug!(%outcome, "no listener for flush outcome");
            }
        };
        let arbiter = Arbiter::new(controller, link.clone(), peripheral.clone(), sink)
            .spawn()
            .context("Failed to spawn arbiter thread")?;

        let pins = RecordingPins::new();
        let adapter = TransportAdapter::new(controller, link, Arc::new(pins.clone()));
        info!(
            channel = controller.default_channel + 1,
            prefix = adapter.prefix(),
            loopback_rx = config.loopback_rx,
            "IR link started"
        );

        Ok((
            Self {
                adapter,
                peripheral,
                pins,
                arbiter,
                receiver,
            },
            outcome_rx,
        ))
    }

    pub fn adapter(&self) -> &TransportAdapter {
        &self.adapter
    }

    pub fn peripheral(&self) -> &LoopbackPeripheral {
        &self.peripheral
    }

    pub fn pins(&self) -> &RecordingPins {
        &self.pins
    }

    /// Waits until no queued packets remain and no flush is pending.
    /// Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let link = self.adapter.link();
        let idle = async {
            loop {
                let snapshot = link.snapshot();
                if snapshot.queued == 0 && !snapshot.pending.contains(WakeBits::FLUSH) {
                    return;
                }
                tokio::time::sleep(DRAIN_POLL).await;
            }
        };
        match tokio::time::timeout(timeout, idle).await {
            Ok(()) => true,
            Err(_) => {
                warn!(queued = link.queued(), "timed out draining the command queue");
                false
            }
        }
    }

    /// Stops the workers and collects their counters. Blocks until the
    /// arbiter finishes its current transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread panicked.
    pub fn shutdown(self) -> Result<DaemonReport> {
        let Self {
            adapter,
            peripheral,
            arbiter,
            receiver,
            ..
        } = self;

        adapter.link().shutdown();
        let arbiter = arbiter
            .join()
            .map_err(|panic| anyhow!("arbiter thread panicked: {panic:?}"))?;

        // the receiver runs until the last capture sender is gone
        drop(peripheral);
        let rx = receiver
            .map(|handle| {
                handle
                    .join()
                    .map_err(|panic| anyhow!("receiver thread panicked: {panic:?}"))
            })
            .transpose()?;

        let report = DaemonReport { arbiter, rx };
        info!(
            flushes = report.arbiter.flushes,
            done_packets = report.arbiter.done_packets,
            "IR link stopped"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("adapter", &self.adapter)
            .field("loopback_rx", &self.receiver.is_some())
            .finish_non_exhaustive()
    }
}
