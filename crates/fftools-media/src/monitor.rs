//! Output monitoring.
//!
//! Streams a child process's text output line by line: every line goes to
//! raw-output subscribers verbatim, and lines recognized as ffmpeg status
//! reports additionally produce a parsed [`ConversionProgress`]. Delivery
//! order matches the order the process emits lines.

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::broadcast;

use fftools_models::ConversionProgress;

/// Broadcast capacity for both event channels. A subscriber that falls
/// further behind than this loses the oldest events.
const CHANNEL_CAPACITY: usize = 256;

/// Number of trailing lines kept for error context.
const TAIL_LINES: usize = 16;

/// Relay for a process's output events.
///
/// The senders live as long as the monitor, so subscribers stay registered
/// across runs; dropping a receiver is deregistration.
#[derive(Debug, Clone)]
pub struct OutputMonitor {
    progress_tx: broadcast::Sender<ConversionProgress>,
    output_tx: broadcast::Sender<String>,
}

impl Default for OutputMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputMonitor {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (output_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            progress_tx,
            output_tx,
        }
    }

    /// Subscribe to parsed progress snapshots.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ConversionProgress> {
        self.progress_tx.subscribe()
    }

    /// Subscribe to raw output lines.
    pub fn subscribe_output(&self) -> broadcast::Receiver<String> {
        self.output_tx.subscribe()
    }

    /// Consume `reader` until EOF, relaying events in line order.
    ///
    /// One pass over one stream; not restartable. Returns the last lines
    /// seen, oldest first, for error reporting.
    pub async fn pump<R>(&self, reader: R) -> Vec<String>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut tail = VecDeque::with_capacity(TAIL_LINES);

        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());

            // A send failure just means nobody is listening right now.
            let _ = self.output_tx.send(line.clone());
            if let Some(progress) = parse_status_line(&line) {
                let _ = self.progress_tx.send(progress);
            }
        }

        tail.into_iter().collect()
    }
}

/// Parse one classic ffmpeg statistics line, e.g.
///
/// ```text
/// frame=  162 fps= 54 q=28.0 size=     256KiB time=00:00:06.58 bitrate= 318.5kbits/s speed=2.18x
/// ```
///
/// Returns `None` for lines that are not status reports; individual fields
/// that fail to parse (or read `N/A`) are simply left unset.
pub fn parse_status_line(line: &str) -> Option<ConversionProgress> {
    if !line.contains("time=") {
        return None;
    }

    let mut progress = ConversionProgress::default();
    let mut recognized = false;

    for (key, value) in status_fields(line) {
        match key {
            "frame" => progress.frame = value.parse().ok(),
            "fps" => progress.fps = value.parse().ok(),
            "size" | "Lsize" => progress.size_kb = parse_size_kb(value),
            "time" => {
                progress.out_time_ms = parse_clock(value)?;
                recognized = true;
            }
            "bitrate" => progress.bitrate_kbps = parse_bitrate(value),
            "speed" => progress.speed = value.strip_suffix('x').and_then(|v| v.parse().ok()),
            _ => {}
        }
    }

    recognized.then_some(progress)
}

/// Split a status line into key/value fields, tolerating the padding ffmpeg
/// inserts between a key's `=` and its value.
fn status_fields(line: &str) -> Vec<(&str, &str)> {
    let mut fields = Vec::new();
    let mut tokens = line.split_whitespace();

    while let Some(token) = tokens.next() {
        if let Some(key) = token.strip_suffix('=') {
            if let Some(value) = tokens.next() {
                fields.push((key, value));
            }
        } else if let Some((key, value)) = token.split_once('=') {
            fields.push((key, value));
        }
    }

    fields
}

/// Parse a size field such as `256KiB` or `1024kB` into kilobytes.
fn parse_size_kb(value: &str) -> Option<u64> {
    value
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

/// Parse a bitrate field such as `318.5kbits/s`.
fn parse_bitrate(value: &str) -> Option<f64> {
    value.strip_suffix("kbits/s").and_then(|v| v.parse().ok())
}

/// Parse ffmpeg's `HH:MM:SS.cc` clock into milliseconds.
fn parse_clock(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0) as i64)
}
