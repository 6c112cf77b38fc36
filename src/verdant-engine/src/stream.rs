//! Incremental decoding of streamed chat completions
//!
//! The completion endpoint answers with an event-stream body: `\n`-terminated
//! lines where `data: `-prefixed lines carry JSON frames and the payload
//! `[DONE]` marks the end. Chunk boundaries are arbitrary, so a trailing
//! partial line (including a split multi-byte character) is buffered across
//! reads. One spawned task pushes parsed chunks into a bounded channel; the
//! consumer drives pacing and always sees deltas in arrival order.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::metrics::{MetricsTracker, StreamMetrics};
use crate::{ApiError, Result};

const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

/// One decoded unit of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental assistant text
    Content(String),
    /// Terminal metrics record; nothing follows it
    Metrics(StreamMetrics),
}

/// One parsed `data:` frame
#[derive(Debug, Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Buffers raw bytes across reads and yields complete `\n`-terminated lines
#[derive(Debug, Default)]
struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Remaining bytes once the stream ends, when the final line had no newline
    fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            let rest = self.buf.split_to(self.buf.len());
            Some(String::from_utf8_lossy(&rest).into_owned())
        }
    }
}

enum ReadOutcome {
    Completed,
    Cancelled,
    Failed,
    ReceiverGone,
}

/// Drive the decode loop over a raw byte stream, emitting chunks into `tx`.
///
/// Always ends the sequence with exactly one terminal metrics chunk unless
/// the transport failed or the receiver went away.
pub(crate) async fn run_decoder<S, E>(
    byte_stream: S,
    cancel: CancellationToken,
    tx: mpsc::Sender<Result<StreamChunk>>,
) where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut metrics = MetricsTracker::start();
    // read_loop owns the byte stream, so the reader is released before the
    // terminal chunk goes out.
    let outcome = read_loop(byte_stream, &cancel, &mut metrics, &tx).await;
    let terminal = match outcome {
        ReadOutcome::Completed => metrics.finish(),
        ReadOutcome::Cancelled => metrics.finish_cancelled(),
        ReadOutcome::Failed | ReadOutcome::ReceiverGone => return,
    };
    let _ = tx.send(Ok(StreamChunk::Metrics(terminal))).await;
}

async fn read_loop<S, E>(
    byte_stream: S,
    cancel: &CancellationToken,
    metrics: &mut MetricsTracker,
    tx: &mpsc::Sender<Result<StreamChunk>>,
) -> ReadOutcome
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut byte_stream = std::pin::pin!(byte_stream);
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::select! {
            // Cancellation wins when both are ready.
            biased;
            _ = cancel.cancelled() => return ReadOutcome::Cancelled,
            next = byte_stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                for line in lines.push(&chunk) {
                    if !process_line(&line, metrics, tx).await {
                        return ReadOutcome::ReceiverGone;
                    }
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(Err(ApiError::StreamError(e.to_string()))).await;
                return ReadOutcome::Failed;
            }
            None => break,
        }
    }

    if let Some(rest) = lines.flush() {
        if !process_line(&rest, metrics, tx).await {
            return ReadOutcome::ReceiverGone;
        }
    }
    ReadOutcome::Completed
}

/// Handle one decoded line; returns false when the receiver is gone.
async fn process_line(
    line: &str,
    metrics: &mut MetricsTracker,
    tx: &mpsc::Sender<Result<StreamChunk>>,
) -> bool {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return true;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return true;
    };
    if payload == DONE_PAYLOAD {
        return true;
    }

    let frame: ChunkFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            // Malformed frames must not abort the stream.
            tracing::debug!(error = %e, "Skipping malformed stream frame");
            return true;
        }
    };

    let Some(choice) = frame.choices.into_iter().next() else {
        return true;
    };
    if let Some(reason) = choice.finish_reason {
        metrics.record_finish_reason(reason);
    }
    if let Some(delta) = choice.delta.content {
        if !delta.is_empty() {
            metrics.record_delta(&delta);
            if tx.send(Ok(StreamChunk::Content(delta))).await.is_err() {
                return false;
            }
        }
    }
    true
}
