//! Protocol error types.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid channel: {0} (expected 0..=7)")]
    InvalidChannel(u8),

    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Reserved field mismatch: expected 0x1, got {0:#x}")]
    ReservedMismatch(u8),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
