//! In-memory stand-ins for the IR LED and the GPIO block.
//!
//! Used on hosts without IR hardware and throughout the tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use lego_ir_protocol::{Packet, Symbol, decode};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::adapter::PinDriver;
use crate::error::{ControllerResult, TxError};
use crate::receiver::CaptureSender;
use crate::transmitter::SymbolPeripheral;

/// Completed transmissions kept for inspection by default.
pub const DEFAULT_HISTORY: usize = 256;

#[derive(Debug)]
struct LoopbackState {
    pending: Vec<Symbol>,
    history: VecDeque<Vec<Symbol>>,
    history_limit: usize,
    completed: u64,
    fail_next: Option<TxError>,
}

impl LoopbackState {
    fn with_history(history_limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: VecDeque::with_capacity(history_limit),
            history_limit,
            completed: 0,
            fail_next: None,
        }
    }

    fn record(&mut self, symbols: Vec<Symbol>) {
        self.completed += 1;
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(symbols);
    }
}

/// Airtime of `symbols` on the LED.
fn airtime(symbols: &[Symbol]) -> Duration {
    Duration::from_micros(symbols.iter().map(|s| u64::from(s.duration_us())).sum())
}

/// Plays every transmission out in real time, keeps the most recent ones and
/// optionally loops them back into the receive path. Clones share the same
/// recording.
#[derive(Debug, Clone)]
pub struct LoopbackPeripheral {
    state: Arc<Mutex<LoopbackState>>,
    capture: Option<CaptureSender>,
}

impl Default for LoopbackPeripheral {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl LoopbackPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` completed transmissions; older ones are dropped.
    pub fn with_history(limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState::with_history(limit))),
            capture: None,
        }
    }

    /// Forwards each completed transmission to `capture`.
    #[must_use]
    pub fn with_capture(mut self, capture: CaptureSender) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Makes the next `wait_done` fail with `err`; the pending symbols are lost.
    pub fn fail_next(&self, err: TxError) {
        self.state.lock().fail_next = Some(err);
    }

    /// The retained transmissions, oldest first.
    pub fn transmissions(&self) -> Vec<Vec<Symbol>> {
        self.state.lock().history.iter().cloned().collect()
    }

    /// Transmissions completed since creation, including ones no longer retained.
    pub fn completed(&self) -> u64 {
        self.state.lock().completed
    }

    /// Packets in the retained transmissions, decoded back from the symbols.
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.transmissions()
            .iter()
            .flat_map(|symbols| decode(symbols))
            .map(|frame| frame.packet)
            .collect()
    }

    pub fn clear(&self) {
        self.state.lock().history.clear();
    }
}

impl SymbolPeripheral for LoopbackPeripheral {
    fn write(&mut self, symbols: &[Symbol]) -> Result<(), TxError> {
        self.state.lock().pending.extend_from_slice(symbols);
        Ok(())
    }

    /// Blocks for the airtime of the pending symbols, or for `timeout` if the
    /// burst would not finish in time.
    fn wait_done(&mut self, timeout: Duration) -> Result<(), TxError> {
        let (symbols, injected) = {
            let mut state = self.state.lock();
            (std::mem::take(&mut state.pending), state.fail_next.take())
        };
        if let Some(err) = injected {
            return Err(err);
        }

        let needed = airtime(&symbols);
        if needed > timeout {
            std::thread::sleep(timeout);
            warn!(?needed, ?timeout, "loopback transmission timed out");
            return Err(TxError::Timeout(timeout));
        }
        std::thread::sleep(needed);

        debug!(symbols = symbols.len(), ?needed, "loopback transmission complete");
        if let Some(capture) = &self.capture {
            if !capture.try_send(symbols.clone()) {
                warn!("loopback capture dropped");
            }
        }
        self.state.lock().record(symbols);
        Ok(())
    }
}

/// Pin driver that remembers every level it was asked to set.
#[derive(Debug, Clone, Default)]
pub struct RecordingPins {
    writes: Arc<Mutex<Vec<(u32, bool)>>>,
}

impl RecordingPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(u32, bool)> {
        self.writes.lock().clone()
    }

    /// Last level written to `pin`, if any.
    pub fn level(&self, pin: u32) -> Option<bool> {
        self.writes
            .lock()
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|&(_, high)| high)
    }
}

impl PinDriver for RecordingPins {
    fn set_level(&self, pin: u32, high: bool) -> ControllerResult<()> {
        self.writes.lock().push((pin, high));
        Ok(())
    }
}
