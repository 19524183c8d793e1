//! Read-only HTTP surface for the polling page.
//!
//! Serves the landing page, the current prediction, and a health snapshot.
//! Handlers never mutate shared state and never see serial-side errors: if
//! nothing has been published yet they serve the configured placeholder.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::VERSION;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::publish::PredictionReader;
use crate::reader::ReaderMetrics;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    host: String,
    port: u16,
    /// Must be set to `true` to bind on a non-localhost address.
    allow_public_bind: bool,
}

impl WebServerConfig {
    /// Create a new config with the default localhost host.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            allow_public_bind: false,
        }
    }

    /// Override the bind host.
    ///
    /// Non-localhost addresses require [`Self::with_dangerous_public_bind`].
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Explicitly opt in to binding on a non-localhost address.
    #[must_use]
    pub fn with_dangerous_public_bind(mut self) -> Self {
        self.allow_public_bind = true;
        self
    }

    fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns `true` when the configured host is a loopback address.
    fn is_localhost(&self) -> bool {
        matches!(
            self.host.as_str(),
            "127.0.0.1" | "::1" | "localhost" | "[::1]"
        )
    }
}

impl From<&ServerConfig> for WebServerConfig {
    fn from(config: &ServerConfig) -> Self {
        let mut web = Self::new(config.port).with_host(config.host.clone());
        if config.allow_public_bind {
            web = web.with_dangerous_public_bind();
        }
        web
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
struct AppState {
    prediction: PredictionReader,
    metrics: Arc<ReaderMetrics>,
    started_at: Instant,
}

/// Handle to a running web server.
#[derive(Debug)]
pub struct WebServerHandle {
    bound_addr: SocketAddr,
    join: JoinHandle<()>,
}

impl WebServerHandle {
    /// The address the server actually bound (relevant with port 0).
    #[must_use]
    pub fn bound_addr(&self) -> SocketAddr {
        self.bound_addr
    }

    /// Wait for the server to finish its graceful shutdown.
    pub async fn join(self) {
        if let Err(err) = self.join.await {
            warn!(error = %err, "web server task panicked");
        }
    }
}

/// Bind and start the web server.
///
/// Refuses non-localhost hosts unless public binding was explicitly allowed.
/// The server drains and exits when `shutdown` flips to true.
pub async fn start_web_server(
    config: WebServerConfig,
    prediction: PredictionReader,
    metrics: Arc<ReaderMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WebServerHandle, ServerError> {
    let addr = config.bind_addr();
    if !config.is_localhost() && !config.allow_public_bind {
        return Err(ServerError::PublicBindRefused { addr });
    }

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let state = AppState {
        prediction,
        metrics,
        started_at: Instant::now(),
    };
    let app = Router::new()
        .route("/", get(index))
        .route("/prediction", get(prediction_endpoint))
        .route("/health", get(health))
        .with_state(state);

    info!(%bound_addr, "web server listening");
    let join = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;
        if let Err(err) = result {
            warn!(error = %err, "web server exited with error");
        } else {
            info!("web server stopped");
        }
    });

    Ok(WebServerHandle { bound_addr, join })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Response body for `GET /prediction`.
#[derive(Debug, Serialize)]
struct PredictionResponse {
    prediction: String,
}

async fn prediction_endpoint(State(state): State<AppState>) -> axum::Json<PredictionResponse> {
    axum::Json(PredictionResponse {
        prediction: state.prediction.current().label,
    })
}

async fn health(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot();
    axum::Json(json!({
        "status": "ok",
        "version": VERSION,
        "uptime_ms": state.started_at.elapsed().as_millis() as u64,
        "serial": snapshot,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::prediction_cell;

    async fn start_test_server(
        placeholder: &str,
    ) -> (
        WebServerHandle,
        crate::publish::PredictionPublisher,
        watch::Sender<bool>,
    ) {
        let (publisher, reader) = prediction_cell(placeholder);
        let metrics = Arc::new(ReaderMetrics::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = start_web_server(WebServerConfig::new(0), reader, metrics, shutdown_rx)
            .await
            .unwrap();
        (handle, publisher, shutdown_tx)
    }

    #[tokio::test]
    async fn prediction_serves_placeholder_then_latest() {
        let (handle, publisher, shutdown) = start_test_server("Waiting for prediction...").await;
        let base = format!("http://{}", handle.bound_addr());

        let body: serde_json::Value = reqwest::get(format!("{base}/prediction"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["prediction"], "Waiting for prediction...");

        publisher.publish("gyakuZuki".to_string(), 123);
        let body: serde_json::Value = reqwest::get(format!("{base}/prediction"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["prediction"], "gyakuZuki");

        shutdown.send(true).unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn index_serves_landing_page() {
        let (handle, _publisher, shutdown) = start_test_server("placeholder").await;
        let base = format!("http://{}", handle.bound_addr());

        let body = reqwest::get(format!("{base}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("/prediction"));

        shutdown.send(true).unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn health_reports_serial_counters() {
        let (handle, _publisher, shutdown) = start_test_server("placeholder").await;
        let base = format!("http://{}", handle.bound_addr());

        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["serial"]["connected"], false);
        assert_eq!(body["serial"]["publications"], 0);

        shutdown.send(true).unwrap();
        handle.join().await;
    }

    #[tokio::test]
    async fn refuses_public_bind_without_opt_in() {
        let (_publisher, reader) = prediction_cell("placeholder");
        let metrics = Arc::new(ReaderMetrics::default());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = start_web_server(
            WebServerConfig::new(0).with_host("0.0.0.0"),
            reader,
            metrics,
            shutdown_rx,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServerError::PublicBindRefused { .. }));
    }
}
