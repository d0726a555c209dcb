//! Workload server: accept loop and per-connection sessions.

mod session;

pub use session::Session;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::store::SampleSource;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Listens for RFWs and streams RFD batches out of a shared sample source.
///
/// Each accepted connection gets an independent session task; sessions
/// share nothing beyond the read-only sample source.
pub struct WorkloadServer {
    config: ServerConfig,
    store: Arc<dyn SampleSource>,
}

impl WorkloadServer {
    /// Create a server over the given sample source.
    pub fn new(config: ServerConfig, store: Arc<dyn SampleSource>) -> Self {
        Self { config, store }
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        info!(addr = %self.config.bind_addr(), "listening for requests");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until cancelled.
    ///
    /// On cancellation the accept loop stops immediately; in-flight
    /// sessions observe the token at their next I/O boundary and are
    /// awaited before this returns.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    debug!(%peer, "accepted connection");
                    let session = Session::new(
                        stream,
                        peer,
                        Arc::clone(&self.store),
                        self.config.failure_budget,
                    );
                    let token = shutdown.child_token();
                    sessions.spawn(async move {
                        if let Err(e) = session.run(token).await {
                            error!(%peer, error = %e, "session terminated");
                        }
                    });
                }
            }

            // Reap finished sessions so the set does not grow unbounded.
            while sessions.try_join_next().is_some() {}
        }

        while let Some(result) = sessions.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "session task panicked");
            }
        }
        info!("server stopped");
        Ok(())
    }
}
