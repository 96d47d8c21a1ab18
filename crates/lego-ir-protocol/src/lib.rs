//! Protocol layer for the four-channel LEGO-compatible IR receiver.
//!
//! This crate is I/O-free. It provides the 16-bit packet model and checksum,
//! the pulse timing alphabet, a resumable encoder that turns packet batches
//! into mark/space symbols, and a decoder that recovers packets from captured
//! symbols.
//!
//! # Key Features
//! - Packet construction, validation and diagnostic formatting
//! - Encoding into caller-sized symbol blocks with a resumable cursor
//! - Decoding with tolerant timing windows and truncation handling
//! - Append payload byte layout shared by the transport and its clients

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(static_mut_refs)]

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod packet;
pub mod payload;
pub mod timing;

pub use decoder::{DecodeSummary, DecodedFrame, decode, decode_with_summary};
pub use encoder::{
    EncodeProgress, EncodeState, EncoderCursor, EncoderPhase, PulseEncoder, frame_symbols,
};
pub use error::{ProtocolError, ProtocolResult};
pub use packet::{
    KeyMask, MAX_CHANNEL, PACKET_BITS, PACKET_BYTES, Packet, RESERVED_VALUE, checksum,
};
pub use payload::{AppendPayload, decode_append_payload, encode_append_payload};
pub use timing::{
    BIT_0, BIT_1, CARRIER_DUTY_PERCENT, CARRIER_FREQUENCY_HZ, END, START, SYMBOLS_PER_FRAME,
    Symbol, TICK_RESOLUTION_HZ,
};
