//! Controller configuration.

use std::time::Duration;

use lego_ir_protocol::MAX_CHANNEL;
use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, ControllerResult};

/// Largest command queue the controller accepts.
pub const MAX_QUEUE_CAPACITY: usize = 1024;

/// Runtime configuration of the IR link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Channel used until a set-channel command arrives, 0-based.
    ///
    /// Default: 1 (shown as channel 2 on the receiver).
    pub default_channel: u8,

    /// Maximum number of queued packets awaiting a flush.
    pub queue_capacity: usize,

    /// Size of each symbol block handed to the transmit peripheral.
    pub mem_block_symbols: usize,

    /// Bound on waiting for a transmission to complete, in milliseconds.
    pub tx_timeout_ms: u64,

    /// Number of received captures buffered between the receive callback and
    /// the decode worker.
    pub capture_depth: usize,

    /// Topic prefix the transport routes commands under, without a trailing `/`.
    pub topic_prefix: String,
}

impl ControllerConfig {
    #[must_use]
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.default_channel > MAX_CHANNEL {
            return Err(ControllerError::invalid_configuration(format!(
                "default_channel must be between 0 and {MAX_CHANNEL}"
            )));
        }
        if !(1..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            return Err(ControllerError::invalid_configuration(format!(
                "queue_capacity must be between 1 and {MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.mem_block_symbols == 0 {
            return Err(ControllerError::invalid_configuration(
                "mem_block_symbols must be at least 1",
            ));
        }
        if self.tx_timeout_ms == 0 {
            return Err(ControllerError::invalid_configuration(
                "tx_timeout_ms must be non-zero",
            ));
        }
        if self.capture_depth == 0 {
            return Err(ControllerError::invalid_configuration(
                "capture_depth must be at least 1",
            ));
        }
        let prefix = self.topic_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(ControllerError::invalid_configuration(
                "topic_prefix must not be empty",
            ));
        }
        if prefix.contains(['#', '+']) {
            return Err(ControllerError::invalid_configuration(
                "topic_prefix must not contain wildcards",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    /// Prefix with surrounding slashes removed.
    #[must_use]
    pub fn normalized_prefix(&self) -> &str {
        self.topic_prefix.trim_matches('/')
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_channel: 1,
            queue_capacity: 128,
            mem_block_symbols: 512,
            tx_timeout_ms: 10_000,
            capture_depth: 4,
            topic_prefix: "esp/1".to_string(),
        }
    }
}

/// Builder for `ControllerConfig`.
#[derive(Debug, Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    #[must_use]
    pub fn default_channel(mut self, channel: u8) -> Self {
        self.config.default_channel = channel;
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn mem_block_symbols(mut self, symbols: usize) -> Self {
        self.config.mem_block_symbols = symbols;
        self
    }

    #[must_use]
    pub fn tx_timeout(mut self, timeout: Duration) -> Self {
        self.config.tx_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn capture_depth(mut self, depth: usize) -> Self {
        self.config.capture_depth = depth;
        self
    }

    #[must_use]
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.topic_prefix = prefix.into();
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> ControllerResult<ControllerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
