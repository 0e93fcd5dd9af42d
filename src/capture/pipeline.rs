//! Tasks that move capture output into the hub
//!
//! ```text
//!   stdout ──► pump_lines ──[bounded line channel]──► run_decoder ──► hub
//!   stderr ──► log_stderr ──► tracing
//! ```
//!
//! The line channel is bounded: when decoding or fan-out falls behind, the
//! pump stops reading and the pipe fills, which throttles the capture tool
//! instead of growing memory here.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;

use super::decoder::{decode, DecodeOutcome, Malformed};
use super::reframer::{FrameError, LineReframer};
use crate::hub::BroadcastHub;
use crate::stats::PipelineStats;

/// Longest line excerpt written to logs
const LOG_PREVIEW_LEN: usize = 120;

/// Longest stderr line logged in one piece
const STDERR_LINE_MAX: usize = 4096;

/// Why the stdout pump stopped
#[derive(Debug)]
pub enum PumpEnd {
    /// Capture stdout reached end of file
    Eof,
    /// The decoder side went away
    Closed,
    /// Reframing stopped under `OverflowPolicy::Fail`
    Failed(FrameError),
    /// Reading stdout failed
    Io(std::io::Error),
}

/// Read capture output, reframe it and forward complete lines
///
/// Overflow handling follows the reframer's own policy.
pub async fn pump_lines<R>(
    mut reader: R,
    mut reframer: LineReframer,
    lines: mpsc::Sender<Bytes>,
    stats: Arc<PipelineStats>,
    read_size: usize,
) -> PumpEnd
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_size.max(1)];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return PumpEnd::Io(e),
        };
        stats.add_bytes_read(n);

        let mut complete = reframer.feed(&buf[..n]);
        while let Some(item) = complete.next() {
            match item {
                Ok(line) => {
                    stats.inc_lines();
                    if lines.send(line).await.is_err() {
                        return PumpEnd::Closed;
                    }
                }
                Err(e) => {
                    stats.inc_overflows();
                    tracing::warn!(error = %e, "Oversized capture line discarded");
                    if complete.is_failed() {
                        return PumpEnd::Failed(e);
                    }
                }
            }
        }
    }

    let remainder = reframer.into_remainder();
    if !remainder.is_empty() {
        tracing::debug!(
            bytes = remainder.len(),
            data = %preview(&remainder),
            "Unterminated capture output dropped at EOF"
        );
    }

    PumpEnd::Eof
}

/// Decode forwarded lines and broadcast the records
///
/// Returns the number of records broadcast once the line channel closes.
pub async fn run_decoder(
    mut lines: mpsc::Receiver<Bytes>,
    hub: Arc<BroadcastHub>,
    stats: Arc<PipelineStats>,
) -> u64 {
    let mut records = 0;

    while let Some(line) = lines.recv().await {
        match decode(&line) {
            Ok(record) => {
                stats.inc_records();
                records += 1;
                hub.broadcast_packet(&record).await;
            }
            Err(DecodeOutcome::Empty) => stats.inc_empty(),
            Err(DecodeOutcome::Malformed(Malformed::Incomplete)) => {
                stats.inc_malformed();
                stats.inc_incomplete();
                tracing::trace!(line = %preview(&line), "Incomplete capture line dropped");
            }
            Err(DecodeOutcome::Malformed(reason)) => {
                stats.inc_malformed();
                tracing::debug!(
                    reason = %reason,
                    line = %preview(&line),
                    "Malformed capture line dropped"
                );
            }
        }
    }

    records
}

/// Forward capture stderr to the log, line by line
///
/// Reads until end of file whatever the bytes are, so the capture tool
/// never writes into a closed pipe. Longer lines are logged in pieces.
pub async fn log_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();

    loop {
        line.clear();
        match (&mut reader)
            .take(STDERR_LINE_MAX as u64)
            .read_until(b'\n', &mut line)
            .await
        {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                if !text.trim_start().is_empty() {
                    tracing::warn!(line = %text, "Capture stderr");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Capture stderr unreadable");
                break;
            }
        }
    }
}

fn preview(line: &[u8]) -> Cow<'_, str> {
    let end = line.len().min(LOG_PREVIEW_LEN);
    String::from_utf8_lossy(&line[..end])
}
