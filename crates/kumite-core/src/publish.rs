//! Publication throttle and shared latest-prediction cell.
//!
//! The reader task is the single writer; HTTP handlers hold cheap
//! [`PredictionReader`] clones. The cell is a `watch` channel so readers
//! always observe the most recent publication without locking shared with
//! the writer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;

/// Minimum-interval gate between publications.
///
/// Timestamp-parameterized: callers pass `now_ms` so tests drive the clock
/// explicitly. The first acquire always succeeds.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: u64,
    last_publish_ms: Option<u64>,
}

impl Throttle {
    /// Create a throttle with the given minimum interval.
    #[must_use]
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_publish_ms: None,
        }
    }

    /// Try to pass the gate at `now_ms`. Returns `true` and records the
    /// timestamp when at least `interval_ms` has elapsed since the last
    /// successful acquire.
    pub fn try_acquire(&mut self, now_ms: u64) -> bool {
        let allowed = match self.last_publish_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if allowed {
            self.last_publish_ms = Some(now_ms);
        }
        allowed
    }

    /// Timestamp of the last successful acquire, if any.
    #[must_use]
    pub fn last_publish_ms(&self) -> Option<u64> {
        self.last_publish_ms
    }
}

/// The most recently published winning label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Winning label, or the configured placeholder before the first
    /// publication.
    pub label: String,
    /// Publication timestamp (epoch ms); zero for the placeholder.
    pub published_at_ms: u64,
}

/// Single-writer handle held by the reader task.
#[derive(Debug)]
pub struct PredictionPublisher {
    tx: watch::Sender<Prediction>,
}

/// Read handle for HTTP handlers.
#[derive(Debug, Clone)]
pub struct PredictionReader {
    rx: watch::Receiver<Prediction>,
}

/// Create the shared prediction cell, initialized to `placeholder`.
#[must_use]
pub fn prediction_cell(placeholder: &str) -> (PredictionPublisher, PredictionReader) {
    let (tx, rx) = watch::channel(Prediction {
        label: placeholder.to_string(),
        published_at_ms: 0,
    });
    (PredictionPublisher { tx }, PredictionReader { rx })
}

impl PredictionPublisher {
    /// Publish a new winning label.
    pub fn publish(&self, label: String, now_ms: u64) {
        // send_replace never fails; the cell keeps the last value even with
        // no active readers.
        let _ = self.tx.send_replace(Prediction {
            label,
            published_at_ms: now_ms,
        });
    }
}

impl PredictionReader {
    /// Current prediction (placeholder until the first publication).
    #[must_use]
    pub fn current(&self) -> Prediction {
        self.rx.borrow().clone()
    }
}

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
