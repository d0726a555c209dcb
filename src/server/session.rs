//! Per-connection server session
//!
//! A session reads one request, streams its reply batches, and closes.
//! Malformed submissions are answered with a `NOP` frame and charged
//! against the session's failure budget, keeping the connection alive so
//! the peer can resend; exceeding the budget closes it.

use crate::error::{ProtocolError, Result};
use crate::protocol::header::{RFW_HEADER_LEN, RfdHeader, RfwHeader, encode_nop};
use crate::protocol::payload::{RfdPayload, decode_rfw, encode_rfd};
use crate::protocol::{MAX_PAYLOAD_LEN, Protocol};
use crate::store::SampleSource;
use crate::types::Rfw;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one request-read attempt ended.
enum RequestOutcome {
    /// A well-formed request was decoded
    Accepted(Rfw),
    /// A budgeted fault was signalled; read the next submission
    Faulted,
    /// The peer vanished (or shutdown fired) mid-recovery
    Disconnected,
}

/// State machine for one accepted connection.
///
/// Generic over the stream so the machine can be driven over an in-memory
/// duplex in tests.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    store: Arc<dyn SampleSource>,
    failure_budget: u32,
    failed_attempts: u32,
    rfw_id: Option<u32>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an accepted connection.
    pub fn new(
        stream: S,
        peer: SocketAddr,
        store: Arc<dyn SampleSource>,
        failure_budget: u32,
    ) -> Self {
        Self {
            stream,
            peer,
            store,
            failure_budget,
            failed_attempts: 0,
            rfw_id: None,
        }
    }

    /// Drive the session to completion.
    ///
    /// Returns `Ok` on a normal close (stream complete, budget exhausted,
    /// peer gone mid-recovery, shutdown); transport errors while streaming
    /// replies surface as `Err`.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        loop {
            if self.failed_attempts > self.failure_budget {
                warn!(
                    peer = %self.peer,
                    attempts = self.failed_attempts,
                    "failure budget exhausted, closing connection"
                );
                return Ok(());
            }

            let mut header_buf = [0u8; RFW_HEADER_LEN];
            let read = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(peer = %self.peer, "session cancelled");
                    return Ok(());
                }
                r = self.stream.read_exact(&mut header_buf) => r,
            };
            if read.is_err() {
                if self.fail("short header read").await.is_err() {
                    debug!(peer = %self.peer, "peer disconnected");
                    return Ok(());
                }
                continue;
            }

            let header = match RfwHeader::decode(&header_buf) {
                Ok(header) => header,
                Err(e) => {
                    if self.fail(&e.to_string()).await.is_err() {
                        debug!(peer = %self.peer, "peer disconnected");
                        return Ok(());
                    }
                    continue;
                }
            };

            let rfw = match self.read_request(&header, &shutdown).await {
                RequestOutcome::Accepted(rfw) => rfw,
                RequestOutcome::Faulted => continue,
                RequestOutcome::Disconnected => {
                    debug!(peer = %self.peer, "peer disconnected");
                    return Ok(());
                }
            };

            // A connection is bound to one request id for its lifetime.
            let rfw_id = match self.rfw_id {
                None => {
                    self.rfw_id = Some(header.rfw_id);
                    header.rfw_id
                }
                Some(bound) => {
                    if bound != header.rfw_id {
                        warn!(
                            peer = %self.peer,
                            expected = bound,
                            got = header.rfw_id,
                            "mismatching request id on resubmission"
                        );
                    }
                    bound
                }
            };

            info!(
                rfw_id,
                peer = %self.peer,
                protocol = header.protocol.label(),
                bench_type = %rfw.bench_type,
                metrics = rfw.wl_metrics.bits(),
                unit = rfw.batch_unit,
                id = rfw.batch_id,
                size = rfw.batch_size,
                "request received"
            );

            self.stream_replies(rfw_id, header.protocol, &rfw, &shutdown)
                .await?;
            debug!(rfw_id, peer = %self.peer, "reply stream complete, closing");
            return Ok(());
        }
    }

    /// Read and decode the request payload.
    async fn read_request(
        &mut self,
        header: &RfwHeader,
        shutdown: &CancellationToken,
    ) -> RequestOutcome {
        if header.payload_len > MAX_PAYLOAD_LEN {
            let fault = ProtocolError::OversizedPayload {
                len: header.payload_len,
                limit: MAX_PAYLOAD_LEN,
            };
            return self.faulted(&fault.to_string()).await;
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        let read = tokio::select! {
            _ = shutdown.cancelled() => return RequestOutcome::Disconnected,
            r = self.stream.read_exact(&mut payload) => r,
        };
        if read.is_err() {
            return self.faulted("short payload read").await;
        }

        match decode_rfw(&payload, header.protocol) {
            Ok(rfw) => RequestOutcome::Accepted(rfw),
            Err(e) => self.faulted(&e.to_string()).await,
        }
    }

    /// Signal a budgeted fault and report whether the peer is still there.
    async fn faulted(&mut self, reason: &str) -> RequestOutcome {
        match self.fail(reason).await {
            Ok(()) => RequestOutcome::Faulted,
            Err(_) => RequestOutcome::Disconnected,
        }
    }

    /// Signal a budgeted fault: count it and send a `NOP` frame.
    async fn fail(&mut self, reason: &str) -> std::io::Result<()> {
        self.failed_attempts += 1;
        warn!(
            peer = %self.peer,
            attempts = self.failed_attempts,
            reason,
            "unable to process request, sending NOP"
        );
        self.stream.write_all(&encode_nop()).await?;
        self.stream.flush().await
    }

    /// Stream the reply batches for one accepted request.
    async fn stream_replies(
        &mut self,
        rfw_id: u32,
        protocol: Protocol,
        rfw: &Rfw,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let keys: Vec<String> = rfw
            .wl_metrics
            .keys()
            .into_iter()
            .map(str::to_string)
            .collect();

        for i in 0..rfw.batch_size {
            if shutdown.is_cancelled() {
                info!(rfw_id, "shutdown requested, aborting reply stream");
                return Ok(());
            }

            let index = rfw.batch_id + i;
            let rows = self
                .store
                .get_batch(&rfw.bench_type, rfw.wl_metrics, rfw.batch_unit, index)
                .await
                .map_err(|e| {
                    error!(rfw_id, batch = index, error = %e, "store query failed");
                    e
                })?;
            let row_count = rows.len();
            let short = row_count < rfw.batch_unit as usize;

            let payload = encode_rfd(
                &RfdPayload {
                    keys: keys.clone(),
                    data: rows,
                },
                protocol,
            )?;
            let header = RfdHeader {
                rfw_id,
                last_batch: index,
                protocol,
                payload_len: payload.len() as u64,
            };
            self.stream.write_all(&header.encode()).await?;
            self.stream.flush().await?;
            self.stream.write_all(&payload).await?;
            self.stream.flush().await?;
            debug!(rfw_id, batch = index, rows = row_count, "batch sent");

            if short {
                info!(rfw_id, batch = index, "source exhausted, ending reply stream");
                break;
            }
        }
        Ok(())
    }
}
