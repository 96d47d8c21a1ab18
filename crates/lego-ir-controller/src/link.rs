//! Shared state between command producers and the arbiter.
//!
//! Every field lives behind one mutex. Producers mutate it and raise a wake
//! bit under the same lock; the arbiter is the only consumer and the only
//! thread that ever waits on the condition variable.

use std::sync::Arc;

use bitflags::bitflags;
use lego_ir_protocol::{KeyMask, MAX_CHANNEL, Packet, ProtocolError};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::queue::CommandQueue;

bitflags! {
    /// Pending wake causes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WakeBits: u8 {
        /// Drain the command queue.
        const FLUSH = 0x1;
        /// Re-check held-key state.
        const CONTINUE = 0x2;
        /// Stop the arbiter.
        const SHUTDOWN = 0x4;
    }
}

/// The currently pressed keys and whether their release has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldKeyState {
    pub key: KeyMask,
    pub stop_sent: bool,
}

impl Default for HeldKeyState {
    /// Nothing held and no stop sent yet, so the link opens with a release.
    fn default() -> Self {
        Self {
            key: KeyMask::empty(),
            stop_sent: false,
        }
    }
}

#[derive(Debug)]
struct LinkState {
    queue: CommandQueue,
    held: HeldKeyState,
    channel: u8,
    pending: WakeBits,
}

/// Point-in-time copy of the link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub queued: usize,
    pub held: HeldKeyState,
    pub channel: u8,
    pub pending: WakeBits,
}

/// What the arbiter does next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Hold { key: KeyMask, channel: u8 },
    Release { channel: u8 },
    Flush { batch: Vec<Packet> },
    Continue,
    Shutdown,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LinkState>,
    wake: Condvar,
}

/// Cloneable handle to the shared link state.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

impl LinkHandle {
    pub fn new(config: &ControllerConfig) -> Self {
        let state = LinkState {
            queue: CommandQueue::with_capacity(config.queue_capacity),
            held: HeldKeyState::default(),
            channel: config.default_channel.min(MAX_CHANNEL),
            pending: WakeBits::empty(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                wake: Condvar::new(),
            }),
        }
    }

    /// Queues `packets` and raises a flush if anything is queued.
    /// Returns the queue length afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::QueueFull`] if the packets do not all fit,
    /// or [`ControllerError::ShutDown`] once the link is shut down.
    pub fn append(&self, packets: &[Packet]) -> ControllerResult<usize> {
        let mut state = self.shared.state.lock();
        if state.pending.contains(WakeBits::SHUTDOWN) {
            return Err(ControllerError::ShutDown);
        }
        state.queue.try_extend(packets)?;
        let queued = state.queue.len();
        if queued > 0 {
            self.raise(&mut state, WakeBits::FLUSH);
        }
        Ok(queued)
    }

    /// Raises a flush if the queue holds anything. Returns whether it did.
    pub fn request_flush(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.queue.is_empty() {
            return false;
        }
        self.raise(&mut state, WakeBits::FLUSH);
        true
    }

    /// Replaces the held keys; an empty mask releases them.
    pub fn set_held_key(&self, key: KeyMask) {
        let mut state = self.shared.state.lock();
        state.held.key = key;
        self.raise(&mut state, WakeBits::CONTINUE);
    }

    /// Switches the channel used for held keys, releases and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if `channel` is above 7.
    pub fn set_channel(&self, channel: u8) -> ControllerResult<()> {
        if channel > MAX_CHANNEL {
            return Err(ProtocolError::InvalidChannel(channel).into());
        }
        let mut state = self.shared.state.lock();
        state.channel = channel;
        self.raise(&mut state, WakeBits::CONTINUE);
        Ok(())
    }

    /// Asks the arbiter to stop. Takes priority over any other work.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        self.raise(&mut state, WakeBits::SHUTDOWN);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().pending.contains(WakeBits::SHUTDOWN)
    }

    pub fn channel(&self) -> u8 {
        self.shared.state.lock().channel
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        let state = self.shared.state.lock();
        LinkSnapshot {
            queued: state.queue.len(),
            held: state.held,
            channel: state.channel,
            pending: state.pending,
        }
    }

    fn raise(&self, state: &mut LinkState, bits: WakeBits) {
        state.pending.insert(bits);
        debug!(wake = ?bits, pending = ?state.pending, "wake raised");
        self.shared.wake.notify_one();
    }

    /// Decides the arbiter's next action, blocking while there is nothing to do.
    ///
    /// Priority: shutdown, held key, pending release, then wake bits. A flush
    /// raised while a key is held stays pending until the release is sent.
    pub(crate) fn next_action(&self) -> Action {
        let mut state = self.shared.state.lock();
        loop {
            if state.pending.contains(WakeBits::SHUTDOWN) {
                return Action::Shutdown;
            }

            if !state.held.key.is_empty() {
                state.held.stop_sent = false;
                return Action::Hold {
                    key: state.held.key,
                    channel: state.channel,
                };
            }

            if !state.held.stop_sent {
                state.held.stop_sent = true;
                return Action::Release {
                    channel: state.channel,
                };
            }

            if !state.pending.is_empty() {
                let wake = std::mem::replace(&mut state.pending, WakeBits::empty());
                if wake.contains(WakeBits::FLUSH) {
                    let channel = state.channel;
                    return Action::Flush {
                        batch: state.queue.take_batch(channel),
                    };
                }
                return Action::Continue;
            }

            self.shared.wake.wait(&mut state);
        }
    }
}
