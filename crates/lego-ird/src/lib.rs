//! Host daemon for the LEGO-compatible IR link.
//!
//! Runs the command arbiter against a loopback peripheral and accepts
//! commands on a line-oriented console, so the full command path can be
//! exercised without IR hardware or a message broker.

#![deny(static_mut_refs)]

pub mod config;
pub mod console;
pub mod daemon;
pub mod logging;

pub use config::{ConfigOrigin, DEFAULT_CONFIG_FILE, DaemonConfig, LoggingConfig};
pub use console::{ConsoleError, ConsoleStats, InboundMessage, format_outcome, parse_line};
pub use daemon::{Daemon, DaemonReport};
pub use logging::init_logging;
