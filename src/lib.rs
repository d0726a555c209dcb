//! # workload-relay
//!
//! Transport for batched time-series workload samples over the RFW/RFD
//! wire protocol: a length-delimited, marker-framed request/reply protocol
//! with dual payload encodings (JSON and binary), sequenced multi-batch
//! replies, server-side failure signalling, and client-side
//! reconnect-and-resume recovery.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - The `wl-server` and `wl-client` binaries are thin
//!   front-ends over this crate
//! - **One request per connection** - A connection carries exactly one RFW
//!   and its reply stream; recovery reopens the connection and resumes
//! - **Budgeted faults** - Framing and decoding faults are answered
//!   (`NOP`/reconnect) and counted, never immediately fatal
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use workload_relay::{SampleStore, ServerConfig, WorkloadServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let store = SampleStore::open(&config.store).await?;
//!     store.bootstrap(&config.store).await?;
//!
//!     let server = WorkloadServer::new(config, Arc::new(store));
//!     server.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Client driver, sessions, and writer pool
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// RFW/RFD wire protocol (framing and payload codecs)
pub mod protocol;
/// Server listener and sessions
pub mod server;
/// Sample store
pub mod store;
/// Core domain types
pub mod types;

// Re-export commonly used types
pub use client::{RequestSpec, RunSummary, WorkloadClient, load_request_file};
pub use config::{ClientConfig, DEFAULT_FAILURE_BUDGET, DEFAULT_PORT, ServerConfig, StoreConfig};
pub use error::{Error, ProtocolError, Result, StoreError};
pub use protocol::Protocol;
pub use server::WorkloadServer;
pub use store::{SampleSource, SampleStore};
pub use types::{Batch, Metric, MetricsMask, Rfw, Row, SampleValue};

/// Wait for a termination signal.
///
/// - **Unix:** SIGTERM or SIGINT, with a `ctrl_c` fallback if signal
///   registration fails (containers, tests).
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        _ => {
            tracing::warn!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Wait for a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}
