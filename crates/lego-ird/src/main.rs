//! legoird - LEGO IR link daemon
//!
//! Reads `<topic> [hex payload]` lines from stdin and drives the IR link.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lego_ird::{ConfigOrigin, Daemon, DaemonConfig, console, format_outcome, init_logging};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "legoird")]
#[command(about = "Drive a LEGO-compatible IR remote link from the command line")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON); defaults are used if it does not exist
    #[arg(short, long, default_value = lego_ird::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log filter, e.g. `info` or `lego_ir_controller=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Initial channel, 0-based
    #[arg(long)]
    channel: Option<u8>,

    /// Topic prefix commands are routed under
    #[arg(long)]
    topic_prefix: Option<String>,

    /// Do not decode transmissions back through the receiver
    #[arg(long)]
    no_loopback: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        match self.verbose {
            0 => {}
            1 => config.logging.level = "debug".to_string(),
            _ => config.logging.level = "trace".to_string(),
        }
        if self.json_logs {
            config.logging.json = true;
        }
        if let Some(channel) = self.channel {
            config.controller.default_channel = channel;
        }
        if let Some(prefix) = &self.topic_prefix {
            config.controller.topic_prefix = prefix.clone();
        }
        if self.no_loopback {
            config.loopback_rx = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, origin) = DaemonConfig::load_or_default(&cli.config).await?;
    cli.apply(&mut config);
    init_logging(&config.logging)?;
    match &origin {
        ConfigOrigin::File(path) => info!(path = %path.display(), "loaded configuration"),
        ConfigOrigin::Defaults => info!("no configuration file, using defaults"),
    }
    config.validate().context("Configuration rejected")?;

    let (daemon, mut outcomes) = Daemon::start(&config)?;
    let mut stdout = tokio::io::stdout();
    for topic in daemon.adapter().subscriptions() {
        stdout.write_all(format!("subscribed {topic}\n").as_bytes()).await?;
    }
    stdout.flush().await?;

    let mut lines = console::spawn_line_reader(std::io::BufReader::new(std::io::stdin()))
        .context("Failed to start console reader")?;
    tokio::select! {
        stats = console::run(daemon.adapter(), &mut lines, tokio::io::stdout(), &mut outcomes) => {
            let stats = stats.context("Console I/O failed")?;
            info!(dispatched = stats.dispatched, rejected = stats.rejected, "input finished");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            info!("Received interrupt");
        }
    }

    if !daemon.drain(DRAIN_TIMEOUT).await {
        warn!("shutting down with packets still queued");
    }
    let callback_topic = daemon.adapter().callback_topic();
    let report = tokio::task::spawn_blocking(move || daemon.shutdown())
        .await
        .context("Shutdown task failed")??;

    while let Ok(outcome) = outcomes.try_recv() {
        stdout
            .write_all(format!("{}\n", format_outcome(&callback_topic, outcome)).as_bytes())
            .await?;
    }
    stdout.flush().await?;

    let report = serde_json::to_string(&report).context("Failed to serialize report")?;
    info!(%report, "final counters");
    Ok(())
}
