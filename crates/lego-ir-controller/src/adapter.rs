//! Transport adapter: turns inbound messages into link state changes.
//!
//! Topics are routed relative to the configured prefix:
//!
//! | topic                     | payload                              |
//! |---------------------------|--------------------------------------|
//! | `lego/cmd/append`         | packets, 2 bytes each, low byte first |
//! | `lego/cmd/flush`          | ignored                              |
//! | `lego/button`             | one byte, key mask                   |
//! | `lego/channel`            | one byte, 0-based channel            |
//! | `gpio/<pin>/set/<level>`  | ignored                              |
//!
//! Flush outcomes are published on `lego/cmd/callback`.

use std::sync::Arc;

use lego_ir_protocol::{KeyMask, decode_append_payload};
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::link::LinkHandle;

pub const APPEND_TOPIC: &str = "lego/cmd/append";
pub const FLUSH_TOPIC: &str = "lego/cmd/flush";
pub const BUTTON_TOPIC: &str = "lego/button";
pub const CHANNEL_TOPIC: &str = "lego/channel";
pub const CALLBACK_TOPIC: &str = "lego/cmd/callback";

/// Output pins the transport may drive directly.
pub trait PinDriver: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the pin cannot be driven.
    fn set_level(&self, pin: u32, high: bool) -> ControllerResult<()>;
}

/// A routed inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Append,
    Flush,
    Button,
    Channel,
    PinSet { pin: u32, level: u32 },
}

impl Topic {
    /// Routes `topic` under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::UnknownTopic`] for anything outside the
    /// prefix or not in the routing table.
    pub fn parse(prefix: &str, topic: &str) -> ControllerResult<Self> {
        let suffix = topic
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| ControllerError::unknown_topic(topic))?;

        match suffix {
            APPEND_TOPIC => Ok(Self::Append),
            FLUSH_TOPIC => Ok(Self::Flush),
            BUTTON_TOPIC => Ok(Self::Button),
            CHANNEL_TOPIC => Ok(Self::Channel),
            _ => parse_pin_topic(suffix).ok_or_else(|| ControllerError::unknown_topic(topic)),
        }
    }
}

fn parse_pin_topic(suffix: &str) -> Option<Topic> {
    let mut parts = suffix.split('/');
    let (Some("gpio"), Some(pin), Some("set"), Some(level), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };
    Some(Topic::PinSet {
        pin: pin.parse().ok()?,
        level: level.parse().ok()?,
    })
}

/// Cloneable front door for command producers.
#[derive(Clone)]
pub struct TransportAdapter {
    link: LinkHandle,
    pins: Arc<dyn PinDriver>,
    prefix: Arc<str>,
}

impl std::fmt::Debug for TransportAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportAdapter")
            .field("link", &self.link)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl TransportAdapter {
    pub fn new(config: &ControllerConfig, link: LinkHandle, pins: Arc<dyn PinDriver>) -> Self {
        Self {
            link,
            pins,
            prefix: Arc::from(config.normalized_prefix()),
        }
    }

    pub fn link(&self) -> &LinkHandle {
        &self.link
    }

    /// Topic prefix, without a trailing `/`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full topic flush outcomes are published on.
    pub fn callback_topic(&self) -> String {
        format!("{}/{CALLBACK_TOPIC}", self.prefix)
    }

    /// Full topics the transport should subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        [APPEND_TOPIC, FLUSH_TOPIC, BUTTON_TOPIC, CHANNEL_TOPIC, "gpio/+/set/+"]
            .iter()
            .map(|topic| format!("{}/{topic}", self.prefix))
            .collect()
    }

    /// Queues the packets in `payload`. Returns how many were queued.
    ///
    /// A trailing odd byte is dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::QueueFull`] if the packets do not all fit;
    /// nothing is queued in that case.
    pub fn append(&self, payload: &[u8]) -> ControllerResult<usize> {
        let decoded = decode_append_payload(payload);
        if decoded.trailing_bytes > 0 {
            warn!(
                len = payload.len(),
                trailing = decoded.trailing_bytes,
                "append payload is not a whole number of packets, dropping tail"
            );
        }
        let queued = self.link.append(&decoded.packets)?;
        info!(packets = decoded.packets.len(), queued, "received packets");
        Ok(decoded.packets.len())
    }

    /// Requests a flush. Returns `false`, with a warning, if the queue is empty.
    pub fn flush(&self) -> bool {
        let raised = self.link.request_flush();
        if !raised {
            warn!("received flush, but the queue is empty");
        }
        raised
    }

    /// Sets the held keys from the first payload byte; 0 releases.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::EmptyPayload`] if `payload` is empty.
    pub fn set_held_key(&self, payload: &[u8]) -> ControllerResult<KeyMask> {
        let &[byte, ..] = payload else {
            return Err(ControllerError::EmptyPayload(BUTTON_TOPIC));
        };
        if byte > 0x0F {
            warn!(value = byte, "key mask wider than four bits, truncating");
        }
        if payload.len() > 1 {
            debug!(len = payload.len(), "ignoring extra key mask bytes");
        }
        let key = KeyMask::from_nibble(byte);
        self.link.set_held_key(key);
        debug!(key = key.bits(), "held key updated");
        Ok(key)
    }

    /// Switches the channel from the first payload byte (0-based).
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` is empty or the channel is above 7.
    pub fn set_channel(&self, payload: &[u8]) -> ControllerResult<u8> {
        let &[channel, ..] = payload else {
            return Err(ControllerError::EmptyPayload(CHANNEL_TOPIC));
        };
        self.link.set_channel(channel)?;
        info!(channel = channel + 1, "channel changed");
        Ok(channel)
    }

    /// Drives `pin` to `level`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidPinLevel`] unless `level` is 0 or 1,
    /// or whatever the pin driver reports.
    pub fn set_pin(&self, pin: u32, level: u32) -> ControllerResult<()> {
        let high = match level {
            0 => false,
            1 => true,
            other => return Err(ControllerError::InvalidPinLevel(other)),
        };
        info!(pin, level, "setting pin level");
        self.pins.set_level(pin, high)
    }

    /// Routes one inbound message.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown topics or when the routed operation fails.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> ControllerResult<()> {
        match Topic::parse(&self.prefix, topic)? {
            Topic::Append => self.append(payload).map(drop),
            Topic::Flush => {
                self.flush();
                Ok(())
            }
            Topic::Button => self.set_held_key(payload).map(drop),
            Topic::Channel => self.set_channel(payload).map(drop),
            Topic::PinSet { pin, level } => self.set_pin(pin, level),
        }
    }
}
