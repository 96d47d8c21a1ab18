//! Line-oriented transport for hosts without a broker connection.
//!
//! Each input line is `<topic> [hex payload]`, for example
//! `lego/cmd/append 24 81 0e 01`. Topics without the configured prefix get
//! it prepended. Flush outcomes are written back as
//! `<callback topic> <outcome>`.

use std::io::{self, BufRead};
use std::thread;

use lego_ir_controller::{TransportAdapter, TxOutcome};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver};
use tracing::{debug, info, warn};

/// Lines buffered between the reader thread and the console loop.
pub const LINE_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Invalid hex payload '{payload}': {source}")]
    InvalidHex {
        payload: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Counters for one console session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleStats {
    pub lines: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub outcomes: u64,
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns [`ConsoleError::InvalidHex`] if the payload is not an even number
/// of hex digits.
pub fn parse_line(line: &str, prefix: &str) -> Result<Option<InboundMessage>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let Some(topic) = tokens.next() else {
        return Ok(None);
    };
    let digits: String = tokens.collect();
    let payload = hex::decode(&digits).map_err(|source| ConsoleError::InvalidHex {
        payload: digits.clone(),
        source,
    })?;

    let prefix = prefix.trim_end_matches('/');
    let topic = if topic.starts_with(&format!("{prefix}/")) {
        topic.to_string()
    } else {
        format!("{prefix}/{}", topic.trim_start_matches('/'))
    };

    Ok(Some(InboundMessage { topic, payload }))
}

/// Renders a flush outcome as the transport would publish it.
pub fn format_outcome(callback_topic: &str, outcome: TxOutcome) -> String {
    format!("{callback_topic} {outcome}")
}

/// Reads `reader` line by line on a dedicated thread and forwards the lines.
///
/// Blocking reads such as stdin cannot be cancelled, so they are kept off the
/// async runtime; the thread is detached and never delays shutdown. The
/// channel closes at end of input or on a read error.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_line_reader<R>(reader: R) -> io::Result<Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    let _reader = thread::Builder::new()
        .name("legoird-input".to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read console input");
                        break;
                    }
                }
            }
            debug!("console input reader finished");
        })?;
    Ok(rx)
}

/// Feeds `lines` into `adapter` until the channel closes, echoing flush
/// outcomes to `output` as they arrive.
///
/// # Errors
///
/// Returns an error if writing `output` fails.
pub async fn run<W>(
    adapter: &TransportAdapter,
    lines: &mut Receiver<String>,
    mut output: W,
    outcomes: &mut UnboundedReceiver<TxOutcome>,
) -> io::Result<ConsoleStats>
where
    W: AsyncWrite + Unpin,
{
    let callback_topic = adapter.callback_topic();
    let prefix = adapter.prefix().to_string();
    let mut stats = ConsoleStats::default();
    let mut outcomes_open = true;

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    break;
                };
                stats.lines += 1;
                match handle_line(adapter, &line, &prefix) {
                    Ok(true) => stats.dispatched += 1,
                    Ok(false) => {}
                    Err(message) => {
                        stats.rejected += 1;
                        output.write_all(format!("error: {message}\n").as_bytes()).await?;
                    }
                }
            }
            outcome = outcomes.recv(), if outcomes_open => {
                match outcome {
                    Some(outcome) => {
                        stats.outcomes += 1;
                        let rendered = format_outcome(&callback_topic, outcome);
                        output.write_all(format!("{rendered}\n").as_bytes()).await?;
                    }
                    None => outcomes_open = false,
                }
            }
        }
        output.flush().await?;
    }

    info!(
        lines = stats.lines,
        dispatched = stats.dispatched,
        rejected = stats.rejected,
        "console input closed"
    );
    Ok(stats)
}

/// Returns whether a message was dispatched, or the rendered error.
fn handle_line(adapter: &TransportAdapter, line: &str, prefix: &str) -> Result<bool, String> {
    let message = match parse_line(line, prefix) {
        Ok(Some(message)) => message,
        Ok(None) => return Ok(false),
        Err(err) => {
            warn!(error = %err, "unparseable console line");
            return Err(err.to_string());
        }
    };

    debug!(topic = %message.topic, len = message.payload.len(), "console message");
    adapter
        .dispatch(&message.topic, &message.payload)
        .map(|()| true)
        .map_err(|err| {
            warn!(topic = %message.topic, error = %err, "command rejected");
            err.to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_skips_blank_and_comment_lines() -> TestResult {
        assert_eq!(parse_line("", "esp/1")?, None);
        assert_eq!(parse_line("   ", "esp/1")?, None);
        assert_eq!(parse_line("# hold left forward", "esp/1")?, None);
        Ok(())
    }

    #[test]
    fn test_parse_prepends_prefix() -> TestResult {
        let message = parse_line("lego/button 02", "esp/1")?.ok_or("no message")?;
        assert_eq!(message.topic, "esp/1/lego/button");
        assert_eq!(message.payload, vec![0x02]);

        let message = parse_line("esp/1/lego/cmd/flush", "esp/1/")?.ok_or("no message")?;
        assert_eq!(message.topic, "esp/1/lego/cmd/flush");
        assert!(message.payload.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_joins_hex_tokens() -> TestResult {
        let spaced = parse_line("lego/cmd/append 24 81 0e 01", "esp/1")?;
        let packed = parse_line("lego/cmd/append 24810e01", "esp/1")?;
        assert_eq!(spaced, packed);
        assert_eq!(
            spaced.map(|m| m.payload),
            Some(vec![0x24, 0x81, 0x0e, 0x01])
        );
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_hex() {
        assert!(matches!(
            parse_line("lego/cmd/append 2", "esp/1"),
            Err(ConsoleError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_line("lego/button zz", "esp/1"),
            Err(ConsoleError::InvalidHex { .. })
        ));
    }

    #[tokio::test]
    async fn test_line_reader_forwards_until_eof() -> TestResult {
        let input = io::Cursor::new(b"lego/button 02\n\nlego/button 00\n".to_vec());
        let mut lines = spawn_line_reader(input)?;

        let mut received = Vec::new();
        while let Some(line) = lines.recv().await {
            received.push(line);
        }
        assert_eq!(received, vec!["lego/button 02", "", "lego/button 00"]);
        Ok(())
    }

    /// Reader that blocks until its sender is dropped, like an idle terminal.
    struct IdleInput(std::sync::mpsc::Receiver<()>);

    impl io::Read for IdleInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(()) | Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn test_blocked_reader_does_not_hold_up_runtime_shutdown() -> TestResult {
        let (wake, idle) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let started = std::time::Instant::now();
        let closed = runtime.block_on(async {
            let mut lines = spawn_line_reader(io::BufReader::new(IdleInput(idle)))?;
            tokio::select! {
                line = lines.recv() => Ok::<_, io::Error>(line.is_none()),
                () = tokio::time::sleep(std::time::Duration::from_millis(20)) => Ok(false),
            }
        })?;
        drop(runtime);

        assert!(!closed);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        drop(wake);
        Ok(())
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(
            format_outcome("esp/1/lego/cmd/callback", TxOutcome::InvalidArg),
            "esp/1/lego/cmd/callback invalid_arg"
        );
    }
}
