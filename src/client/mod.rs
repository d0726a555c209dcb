//! Workload client: request fan-out, batch ingress queue, and writer pool.
//!
//! The driver launches one session task per request, hands every received
//! batch through a bounded mpsc queue to a single consumer, and the
//! consumer spawns one writer task per batch record. Exit waits for all
//! sessions, the queue to drain, and every writer.

mod request;
mod session;
pub mod writer;

pub use request::{RequestSpec, load_request_file};
pub use session::RequestSession;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::types::Batch;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Requests that received every expected batch
    pub completed: usize,
    /// Requests that gave up or could not connect
    pub failed: usize,
    /// Batch files written
    pub files_written: usize,
    /// Batch files that failed to write
    pub write_failures: usize,
}

/// Issues requests and persists the received batches.
pub struct WorkloadClient {
    config: ClientConfig,
}

impl WorkloadClient {
    /// Create a client driver.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Issue every request and wait for sessions, queue, and writers.
    ///
    /// All requests are validated before the first connection is opened;
    /// a request selecting no columns fails the whole run up front with
    /// nothing written.
    pub async fn run(
        &self,
        requests: Vec<RequestSpec>,
        shutdown: CancellationToken,
    ) -> Result<RunSummary> {
        for spec in &requests {
            spec.rfw.validate()?;
        }

        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(self.config.queue_capacity);
        let ingress = tokio::spawn(drain_batches(batch_rx, self.config.output_dir.clone()));

        let mut sessions = JoinSet::new();
        for spec in requests {
            let rfw_id: u32 = rand::random();
            let session =
                RequestSession::new(&self.config, batch_tx.clone(), rfw_id, spec);
            sessions.spawn(session.run(shutdown.child_token()));
        }
        drop(batch_tx);

        let mut completed = 0;
        let mut failed = 0;
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(Ok(())) => completed += 1,
                Ok(Err(e)) => {
                    error!(error = %e, "request failed");
                    failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "session task panicked");
                    failed += 1;
                }
            }
        }

        // All senders are gone; the consumer drains the queue, then waits
        // for its writers.
        let (files_written, write_failures) = match ingress.await {
            Ok(counts) => counts,
            Err(e) => {
                error!(error = %e, "ingress task panicked");
                (0, 0)
            }
        };

        info!(
            completed,
            failed, files_written, write_failures, "client run finished"
        );
        Ok(RunSummary {
            completed,
            failed,
            files_written,
            write_failures,
        })
    }
}

/// Queue consumer: one writer task per dequeued batch record.
async fn drain_batches(mut rx: mpsc::Receiver<Batch>, dir: PathBuf) -> (usize, usize) {
    let mut writers = JoinSet::new();
    while let Some(batch) = rx.recv().await {
        let dir = dir.clone();
        writers.spawn(async move {
            match writer::write_batch(&dir, &batch).await {
                Ok(_) => true,
                Err(e) => {
                    // Per-file failure; other writers and sessions are
                    // unaffected.
                    error!(
                        rfw_id = batch.rfw_id,
                        batch = batch.batch_id,
                        error = %e,
                        "failed to write batch"
                    );
                    false
                }
            }
        });
    }

    let mut written = 0;
    let mut failed = 0;
    while let Some(result) = writers.join_next().await {
        match result {
            Ok(true) => written += 1,
            Ok(false) => failed += 1,
            Err(e) => {
                error!(error = %e, "writer task panicked");
                failed += 1;
            }
        }
    }
    debug!(written, failed, "writer pool drained");
    (written, failed)
}
