//! Error types for the controller.

use std::time::Duration;

use lego_ir_protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to command producers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// Append would exceed the queue capacity; nothing was queued.
    #[error("Command queue full: capacity {capacity}, queued {queued}, requested {requested}")]
    QueueFull {
        capacity: usize,
        queued: usize,
        requested: usize,
    },

    #[error("Empty payload for {0}")]
    EmptyPayload(&'static str),

    #[error("Invalid pin level: {0} (expected 0 or 1)")]
    InvalidPinLevel(u32),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("Pin driver error on pin {pin}: {reason}")]
    PinFailed { pin: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Link is shut down")]
    ShutDown,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ControllerError {
    #[must_use]
    pub fn queue_full(capacity: usize, queued: usize, requested: usize) -> Self {
        Self::QueueFull {
            capacity,
            queued,
            requested,
        }
    }

    #[must_use]
    pub fn unknown_topic(topic: impl Into<String>) -> Self {
        Self::UnknownTopic(topic.into())
    }

    #[must_use]
    pub fn pin_failed(pin: u32, reason: impl Into<String>) -> Self {
        Self::PinFailed {
            pin,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Failures reported by a transmit peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Invalid transmit argument: {0}")]
    InvalidArgument(String),

    #[error("Transmission did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Transmission failed: {0}")]
    Failed(String),

    #[error("Unexpected transmitter error: {0}")]
    Other(String),
}

impl TxError {
    #[must_use]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Outcome token this error is reported as.
    #[must_use]
    pub fn outcome(&self) -> TxOutcome {
        match self {
            Self::InvalidArgument(_) => TxOutcome::InvalidArg,
            Self::Timeout(_) => TxOutcome::Timeout,
            Self::Failed(_) => TxOutcome::Fail,
            Self::Other(_) => TxOutcome::UnknownError,
        }
    }
}

/// Result of a flush, as published on the callback topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxOutcome {
    Done,
    InvalidArg,
    Timeout,
    Fail,
    UnknownError,
}

impl TxOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::InvalidArg => "invalid_arg",
            Self::Timeout => "timeout",
            Self::Fail => "fail",
            Self::UnknownError => "unknown_error",
        }
    }

    pub fn from_result(result: &Result<(), TxError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(err) => err.outcome(),
        }
    }
}

impl std::fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
