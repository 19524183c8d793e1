//! kumite-core: Core library for kumite
//!
//! kumite bridges an embedded gesture classifier to a browser. A serial
//! device emits one `LABEL: VALUE` score line per channel; the reader
//! aggregates one score per label into a cycle, picks the max-score winner
//! once every expected label has reported, and publishes it (throttled) for
//! the HTTP surface to serve.
//!
//! # Architecture
//!
//! ```text
//! Serial device ──► SerialReader ──► ScoreCycle ──► Throttle
//!                        │                             │
//!                        └──── reconnect loop          ▼
//!                                              PredictionCell (watch)
//!                                                      │
//!                                                      ▼
//!                                              HTTP: / /prediction /health
//! ```
//!
//! # Modules
//!
//! - `config`: TOML configuration with per-field defaults
//! - `error`: Error types
//! - `logging`: Structured logging setup (tracing)
//! - `parse`: `LABEL: VALUE` line parsing
//! - `cycle`: Per-cycle score aggregation and winner selection
//! - `publish`: Publication throttle and shared latest-prediction cell
//! - `reader`: Supervised serial read loop with automatic reconnect
//! - `web`: Read-only HTTP surface for the polling page
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod config;
pub mod cycle;
pub mod error;
pub mod logging;
pub mod parse;
pub mod publish;
pub mod reader;
pub mod web;

pub use config::Config;
pub use error::{Error, Result};

/// Crate version, exposed on the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
