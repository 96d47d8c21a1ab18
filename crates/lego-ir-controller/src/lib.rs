//! Command arbitration and I/O glue for the LEGO-compatible IR link.
//!
//! Producers (a network transport, local inputs) talk to a
//! [`TransportAdapter`], which mutates the shared [`LinkHandle`] state and
//! wakes the [`Arbiter`]. The arbiter is the only writer of the transmit
//! peripheral; it repeats held keys, sends releases and drains queued
//! batches through the pulse encoder. Received captures travel the other way
//! through a bounded hand-off into the [`Receiver`] decode worker.
//!
//! # Key Features
//! - Held key beats queued flush; releases are sent exactly once
//! - Bounded, all-or-nothing command queue
//! - Transmit outcomes reported as the `done`/`invalid_arg`/`timeout`/`fail`/`unknown_error` tokens
//! - Loopback peripheral for running without IR hardware

#![deny(static_mut_refs)]

pub mod adapter;
pub mod arbiter;
pub mod config;
pub mod error;
pub mod link;
pub mod queue;
pub mod receiver;
pub mod sim;
pub mod transmitter;

pub use adapter::{CALLBACK_TOPIC, PinDriver, Topic, TransportAdapter};
pub use arbiter::{Arbiter, ArbiterStats, Cycle, OutcomeSink, RELEASE_STOP_PACKETS};
pub use config::{ControllerConfig, ControllerConfigBuilder};
pub use error::{ControllerError, ControllerResult, TxError, TxOutcome};
pub use link::{HeldKeyState, LinkHandle, LinkSnapshot, WakeBits};
pub use queue::CommandQueue;
pub use receiver::{Capture, CaptureSender, FrameSink, Receiver, RxStats, capture_channel};
pub use sim::{LoopbackPeripheral, RecordingPins};
pub use transmitter::{SymbolPeripheral, Transmitter};
