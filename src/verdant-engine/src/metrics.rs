//! Stream timing and throughput bookkeeping
//!
//! The tracker is threaded through the stream decoder and materializes into
//! the terminal metrics record when the stream ends. The arithmetic lives in
//! `_at` methods taking explicit durations so it stays testable without
//! controlling the wall clock.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Stop reason reported when the user cancels a stream
pub const STOP_REASON_CANCELLED: &str = "Stopped by user";

/// Stop reason substituted for the server's normalized "stop" signal
pub const STOP_REASON_EOS: &str = "EOS Token Found";

/// Stop reason when the server never reported one
pub const STOP_REASON_UNKNOWN: &str = "unknown";

/// Approximate characters per generated token. This is a display heuristic,
/// not real tokenization.
const CHARS_PER_TOKEN: u64 = 4;

/// Final metrics for one streamed completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// Estimated generation throughput
    pub tokens_per_second: f64,
    /// Estimated total tokens generated
    pub total_tokens: u64,
    /// Seconds from request start to the first non-empty delta
    pub time_to_first_token: f64,
    /// Human-readable cause for the stream ending
    pub stop_reason: String,
}

/// Bookkeeping state observed while a stream is running
#[derive(Debug)]
pub struct MetricsTracker {
    started: Instant,
    first_token_at: Option<Duration>,
    total_tokens: u64,
    finish_reason: Option<String>,
}

impl MetricsTracker {
    /// Start the clock. Call when the request is dispatched.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            first_token_at: None,
            total_tokens: 0,
            finish_reason: None,
        }
    }

    /// Record one content delta at the current elapsed time.
    pub fn record_delta(&mut self, delta: &str) {
        let at = self.started.elapsed();
        self.record_delta_at(at, delta);
    }

    fn record_delta_at(&mut self, at: Duration, delta: &str) {
        if delta.is_empty() {
            return;
        }
        if self.first_token_at.is_none() {
            self.first_token_at = Some(at);
        }
        self.total_tokens += estimate_tokens(delta);
    }

    /// Remember the latest finish reason the server reported.
    pub fn record_finish_reason(&mut self, reason: impl Into<String>) {
        self.finish_reason = Some(reason.into());
    }

    /// Materialize the final record after a naturally completed stream.
    pub fn finish(self) -> StreamMetrics {
        let total = self.started.elapsed();
        self.finish_at(total)
    }

    fn finish_at(self, total: Duration) -> StreamMetrics {
        let elapsed = total.as_secs_f64();
        let tokens_per_second = if self.total_tokens > 0 && elapsed > 0.0 {
            self.total_tokens as f64 / elapsed
        } else {
            0.0
        };
        let stop_reason = match self.finish_reason.as_deref() {
            None => STOP_REASON_UNKNOWN.to_string(),
            Some("stop") => STOP_REASON_EOS.to_string(),
            Some(other) => other.to_string(),
        };
        StreamMetrics {
            tokens_per_second,
            total_tokens: self.total_tokens,
            time_to_first_token: self
                .first_token_at
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            stop_reason,
        }
    }

    /// Materialize the final record after a user cancellation.
    ///
    /// Cancelled streams report zeroed figures with the cancellation stop
    /// reason rather than the partial consumption.
    pub fn finish_cancelled(self) -> StreamMetrics {
        StreamMetrics {
            tokens_per_second: 0.0,
            total_tokens: 0,
            time_to_first_token: 0.0,
            stop_reason: STOP_REASON_CANCELLED.to_string(),
        }
    }
}

/// Rough token estimate: one token per four characters, rounded up per delta
fn estimate_tokens(delta: &str) -> u64 {
    let chars = delta.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_arithmetic() {
        let mut tracker = MetricsTracker::start();
        tracker.record_delta_at(Duration::from_millis(500), &"x".repeat(40));
        tracker.record_finish_reason("stop");
        let metrics = tracker.finish_at(Duration::from_secs(2));

        assert_eq!(metrics.total_tokens, 10);
        assert!((metrics.tokens_per_second - 5.0).abs() < f64::EPSILON);
        assert!((metrics.time_to_first_token - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.stop_reason, STOP_REASON_EOS);
    }

    #[test]
    fn test_tokens_round_up_per_delta() {
        let mut tracker = MetricsTracker::start();
        tracker.record_delta_at(Duration::from_millis(10), "hello");
        tracker.record_delta_at(Duration::from_millis(20), "hi");
        let metrics = tracker.finish_at(Duration::from_secs(1));

        // ceil(5/4) + ceil(2/4), not ceil(7/4)
        assert_eq!(metrics.total_tokens, 3);
    }

    #[test]
    fn test_no_tokens_means_zero_throughput() {
        let tracker = MetricsTracker::start();
        let metrics = tracker.finish_at(Duration::from_secs(3));

        assert_eq!(metrics.total_tokens, 0);
        assert_eq!(metrics.tokens_per_second, 0.0);
        assert_eq!(metrics.time_to_first_token, 0.0);
        assert_eq!(metrics.stop_reason, STOP_REASON_UNKNOWN);
    }

    #[test]
    fn test_empty_delta_does_not_start_the_clock() {
        let mut tracker = MetricsTracker::start();
        tracker.record_delta_at(Duration::from_millis(100), "");
        tracker.record_delta_at(Duration::from_millis(700), "late");
        let metrics = tracker.finish_at(Duration::from_secs(1));

        assert!((metrics.time_to_first_token - 0.7).abs() < f64::EPSILON);
        assert_eq!(metrics.total_tokens, 1);
    }

    #[test]
    fn test_unrecognized_finish_reason_passes_through() {
        let mut tracker = MetricsTracker::start();
        tracker.record_delta_at(Duration::from_millis(10), "abcd");
        tracker.record_finish_reason("length");
        let metrics = tracker.finish_at(Duration::from_secs(1));

        assert_eq!(metrics.stop_reason, "length");
    }

    #[test]
    fn test_cancellation_zeroes_the_record() {
        let mut tracker = MetricsTracker::start();
        tracker.record_delta_at(Duration::from_millis(100), &"y".repeat(80));
        tracker.record_finish_reason("stop");
        let metrics = tracker.finish_cancelled();

        assert_eq!(metrics.total_tokens, 0);
        assert_eq!(metrics.tokens_per_second, 0.0);
        assert_eq!(metrics.time_to_first_token, 0.0);
        assert_eq!(metrics.stop_reason, STOP_REASON_CANCELLED);
    }
}
