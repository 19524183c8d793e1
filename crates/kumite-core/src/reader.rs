//! Supervised serial read loop with automatic reconnect.
//!
//! The reader owns the serial connection lifecycle: it opens the configured
//! device, reads score lines, feeds the aggregation cycle, and publishes the
//! throttled winner. Faults never escape this module — connection-level
//! faults re-enter the reconnect loop after a fixed pause, line-level faults
//! pause briefly and keep the connection.
//!
//! # State machine
//!
//! ```text
//! Connecting ──open ok──► Connected ──read/parse/aggregate──┐
//!     ▲  ▲                    │                             │
//!     │  └──connection fault──┘                             │
//!     └───────open failed (fixed pause, retry forever)──────┘
//! ```
//!
//! The loop runs until the shutdown signal flips; there is no other exit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::time::{Instant, sleep, timeout};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::cycle::ScoreCycle;
use crate::error::SerialError;
use crate::parse::parse_score_line;
use crate::publish::{PredictionPublisher, Throttle, epoch_ms};

/// One read from the transport.
#[derive(Debug)]
pub enum LineEvent {
    /// A complete line, trailing newline stripped.
    Line(String),
    /// The read timeout elapsed with no complete line.
    Timeout,
}

/// A connected, line-oriented transport.
pub trait LineTransport: Send {
    /// Read the next line, bounded by the transport's read timeout.
    ///
    /// Connection-level faults (EOF, I/O errors) surface as
    /// [`SerialError::Disconnected`]; decode faults as
    /// [`SerialError::Decode`].
    fn next_line(
        &mut self,
    ) -> impl Future<Output = Result<LineEvent, SerialError>> + Send;
}

/// Opens transports. The seam that lets tests script connections.
pub trait SerialConnector: Send {
    type Transport: LineTransport;

    /// Attempt to open a new connection.
    fn connect(&mut self) -> impl Future<Output = Result<Self::Transport, SerialError>> + Send;
}

// =============================================================================
// Production transport (tokio-serial)
// =============================================================================

/// Connects to a real serial device via tokio-serial.
#[derive(Debug, Clone)]
pub struct TtyConnector {
    device: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl TtyConnector {
    #[must_use]
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            device: config.device.clone(),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }
}

impl SerialConnector for TtyConnector {
    type Transport = TtyTransport;

    async fn connect(&mut self) -> Result<TtyTransport, SerialError> {
        let stream = tokio_serial::new(&self.device, self.baud_rate)
            .open_native_async()
            .map_err(|e| SerialError::Open {
                device: self.device.clone(),
                message: e.to_string(),
            })?;
        Ok(TtyTransport::new(stream, self.read_timeout))
    }
}

/// Buffered line reader over an open serial stream.
///
/// Generic over the inner stream so tests can drive it with an in-memory
/// duplex pipe.
pub struct TtyTransport<R = SerialStream> {
    reader: BufReader<R>,
    read_timeout: Duration,
    /// Bytes of a partial line carried across timed-out reads.
    ///
    /// `read_until` is not cancellation safe: when the timeout drops the
    /// read future, bytes already moved out of the `BufReader` live in the
    /// destination buffer. Keeping that buffer on the transport means a
    /// mid-line stall resumes the same line instead of losing its prefix
    /// (and then parsing the corrupted remainder as a different label).
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> TtyTransport<R> {
    fn new(stream: R, read_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            read_timeout,
            pending: Vec::new(),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> LineTransport for TtyTransport<R> {
    async fn next_line(&mut self) -> Result<LineEvent, SerialError> {
        match timeout(
            self.read_timeout,
            self.reader.read_until(b'\n', &mut self.pending),
        )
        .await
        {
            // Timed out mid-line: whatever was read so far stays in
            // `pending` for the next call.
            Err(_) => Ok(LineEvent::Timeout),
            Ok(Ok(0)) => Err(SerialError::Disconnected("end of stream".to_string())),
            Ok(Ok(_)) => {
                let buf = std::mem::take(&mut self.pending);
                match String::from_utf8(buf) {
                    Ok(line) => Ok(LineEvent::Line(line.trim_end().to_string())),
                    Err(e) => Err(SerialError::Decode(e.to_string())),
                }
            }
            Ok(Err(e)) => Err(SerialError::Disconnected(e.to_string())),
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Counters shared between the reader loop and the health endpoint.
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    connected: AtomicBool,
    lines_read: AtomicU64,
    parse_misses: AtomicU64,
    reconnects: AtomicU64,
    publications: AtomicU64,
}

/// Point-in-time view of [`ReaderMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub connected: bool,
    pub lines_read: u64,
    pub parse_misses: u64,
    pub reconnects: u64,
    pub publications: u64,
}

impl ReaderMetrics {
    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn record_line(&self) {
        self.lines_read.fetch_add(1, Ordering::SeqCst);
    }

    fn record_parse_miss(&self) {
        self.parse_misses.fetch_add(1, Ordering::SeqCst);
    }

    fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn record_publication(&self) {
        self.publications.fetch_add(1, Ordering::SeqCst);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connected: self.connected.load(Ordering::SeqCst),
            lines_read: self.lines_read.load(Ordering::SeqCst),
            parse_misses: self.parse_misses.load(Ordering::SeqCst),
            reconnects: self.reconnects.load(Ordering::SeqCst),
            publications: self.publications.load(Ordering::SeqCst),
        }
    }
}

// =============================================================================
// Reader loop
// =============================================================================

/// Why the inner read loop returned.
enum ReadExit {
    Shutdown,
    ConnectionFault,
}

/// The supervised serial reader.
pub struct SerialReader<C: SerialConnector> {
    connector: C,
    config: SerialConfig,
    cycle: ScoreCycle,
    throttle: Throttle,
    publisher: PredictionPublisher,
    metrics: Arc<ReaderMetrics>,
    /// Throttle time base. Tokio's clock, so paused-clock tests control it.
    started: Instant,
}

impl<C: SerialConnector> SerialReader<C> {
    /// Build a reader over `connector`.
    #[must_use]
    pub fn new(
        connector: C,
        config: SerialConfig,
        expected_labels: Vec<String>,
        publish_interval_ms: u64,
        publisher: PredictionPublisher,
        metrics: Arc<ReaderMetrics>,
    ) -> Self {
        Self {
            connector,
            config,
            cycle: ScoreCycle::new(expected_labels),
            throttle: Throttle::new(publish_interval_ms),
            publisher,
            metrics,
            started: Instant::now(),
        }
    }

    /// Run until `shutdown` flips to true.
    ///
    /// Never returns an error: every serial-side fault is contained here.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let reconnect_pause = Duration::from_millis(self.config.reconnect_pause_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let transport = tokio::select! {
                () = shutdown_signaled(&mut shutdown) => break,
                result = self.connector.connect() => match result {
                    Ok(transport) => transport,
                    Err(err) => {
                        warn!(device = %self.config.device, error = %err, "serial open failed, retrying");
                        if pause(&mut shutdown, reconnect_pause).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            info!(device = %self.config.device, baud = self.config.baud_rate, "serial connected");
            self.metrics.set_connected(true);
            // A reconnect starts from an empty cycle.
            self.cycle.clear();

            let exit = self.read_loop(transport, &mut shutdown).await;
            self.metrics.set_connected(false);
            match exit {
                ReadExit::Shutdown => break,
                ReadExit::ConnectionFault => {
                    self.metrics.record_reconnect();
                    if pause(&mut shutdown, reconnect_pause).await {
                        break;
                    }
                }
            }
        }

        info!("serial reader stopped");
    }

    async fn read_loop(
        &mut self,
        mut transport: C::Transport,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReadExit {
        let error_pause = Duration::from_millis(self.config.error_pause_ms);

        loop {
            let event = tokio::select! {
                () = shutdown_signaled(shutdown) => return ReadExit::Shutdown,
                event = transport.next_line() => event,
            };

            match event {
                Ok(LineEvent::Timeout) => {}
                Ok(LineEvent::Line(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    self.metrics.record_line();
                    debug!(%line, "serial line");
                    self.observe(&line);
                }
                Err(err) if err.is_connection_fault() => {
                    warn!(error = %err, "serial connection fault");
                    return ReadExit::ConnectionFault;
                }
                Err(err) => {
                    warn!(error = %err, "serial read error");
                    if pause(shutdown, error_pause).await {
                        return ReadExit::Shutdown;
                    }
                }
            }
        }
    }

    /// Feed one line into the cycle and publish if it completed and the
    /// throttle permits. The cycle resets on completion either way.
    fn observe(&mut self, line: &str) {
        let Some(score) = parse_score_line(line) else {
            self.metrics.record_parse_miss();
            return;
        };

        self.cycle.record(score);
        let Some(winner) = self.cycle.take_winner() else {
            return;
        };

        // The throttle runs on monotonic time; the published timestamp is
        // wall-clock for the HTTP surface.
        let now_ms = self.started.elapsed().as_millis() as u64;
        if self.throttle.try_acquire(now_ms) {
            info!(winner = %winner, "publishing prediction");
            self.publisher.publish(winner, epoch_ms());
            self.metrics.record_publication();
        } else {
            debug!(winner = %winner, "cycle complete but throttled, dropped");
        }
    }
}

/// Resolves once the shutdown flag flips to true (or the sender is gone).
async fn shutdown_signaled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `duration`, returning early with `true` if shutdown fires.
async fn pause(rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        () = shutdown_signaled(rx) => true,
        () = sleep(duration) => false,
    }
}
