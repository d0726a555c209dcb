//! Per-request client session
//!
//! One session owns one request for workload: it sends the RFW, consumes
//! the reply stream, and recovers from transport and framing faults by
//! reconnecting and resuming at the next unreceived batch index. The
//! original request stays immutable; resume progress lives in a cursor and
//! a fresh RFW is rendered for every (re)send.

use super::request::RequestSpec;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::header::{RFD_HEADER_LEN, RfdFrame, RfdHeader, RfwHeader, decode_rfd};
use crate::protocol::payload::{decode_rfd_payload, encode_rfw};
use crate::protocol::{MAX_PAYLOAD_LEN, Protocol};
use crate::types::{Batch, Rfw};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Resume position within one request.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    /// Next batch index to ask for
    batch_id: u32,
    /// Batches still expected under the current RFW
    remaining: u32,
}

/// State machine for one outstanding RFW.
pub struct RequestSession {
    queue: mpsc::Sender<Batch>,
    rfw_id: u32,
    protocol: Protocol,
    origin: Rfw,
    cursor: Cursor,
    batch_rcv: u32,
    retries: u32,
    remote_addr: String,
}

impl RequestSession {
    /// Build a session for one request spec.
    pub fn new(
        config: &ClientConfig,
        queue: mpsc::Sender<Batch>,
        rfw_id: u32,
        spec: RequestSpec,
    ) -> Self {
        let cursor = Cursor {
            batch_id: spec.rfw.batch_id,
            remaining: spec.rfw.batch_size,
        };
        Self {
            queue,
            rfw_id,
            protocol: spec.protocol,
            origin: spec.rfw,
            cursor,
            batch_rcv: 0,
            retries: config.retry_budget,
            remote_addr: config.remote_addr(),
        }
    }

    /// Drive the request to completion.
    ///
    /// `Ok` means every expected batch was received (including early
    /// termination on a short batch); connect failures and an exhausted
    /// retry budget surface as `Err`.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            rfw_id = self.rfw_id,
            addr = %self.remote_addr,
            "connecting to server"
        );
        let mut stream = TcpStream::connect(&self.remote_addr).await?;
        self.send_rfw(&mut stream).await?;

        let complete = self.receive_replies(stream, &shutdown).await?;
        if complete {
            info!(rfw_id = self.rfw_id, "all batches received");
            Ok(())
        } else {
            Err(Error::RequestFailed {
                rfw_id: self.rfw_id,
                reason: "retry budget exhausted".into(),
            })
        }
    }

    /// Render the RFW for the current cursor position.
    fn current_rfw(&self) -> Rfw {
        Rfw {
            bench_type: self.origin.bench_type.clone(),
            wl_metrics: self.origin.wl_metrics,
            batch_unit: self.origin.batch_unit,
            batch_id: self.cursor.batch_id,
            batch_size: self.cursor.remaining,
        }
    }

    async fn send_rfw(&self, stream: &mut TcpStream) -> Result<()> {
        let rfw = self.current_rfw();
        info!(
            rfw_id = self.rfw_id,
            protocol = self.protocol.label(),
            bench_type = %rfw.bench_type,
            metrics = rfw.wl_metrics.bits(),
            unit = rfw.batch_unit,
            id = rfw.batch_id,
            size = rfw.batch_size,
            "sending request"
        );
        let payload = encode_rfw(&rfw, self.protocol)?;
        let header = RfwHeader {
            rfw_id: self.rfw_id,
            protocol: self.protocol,
            payload_len: payload.len() as u64,
        };
        stream.write_all(&header.encode()).await?;
        stream.flush().await?;
        debug!(
            rfw_id = self.rfw_id,
            bytes = payload.len(),
            "sending serialized request"
        );
        stream.write_all(&payload).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive_replies(
        &mut self,
        mut stream: TcpStream,
        shutdown: &CancellationToken,
    ) -> Result<bool> {
        while self.retries > 0 {
            let mut header_buf = [0u8; RFD_HEADER_LEN];
            let read = tokio::select! {
                _ = shutdown.cancelled() => return Err(Error::ShuttingDown),
                r = stream.read_exact(&mut header_buf) => r,
            };
            if let Err(e) = read {
                if self.batch_rcv == self.cursor.remaining {
                    // Server closed after the full stream.
                    break;
                }
                warn!(
                    rfw_id = self.rfw_id,
                    error = %e,
                    received = self.batch_rcv,
                    expected = self.cursor.remaining,
                    "connection lost before all batches arrived"
                );
                match self.resume().await? {
                    Some(reopened) => stream = reopened,
                    None => break,
                }
                continue;
            }

            match decode_rfd(&header_buf) {
                Ok(RfdFrame::Nop) => {
                    error!(rfw_id = self.rfw_id, "server was unable to process the request");
                    self.retries -= 1;
                    if self.retries == 0 {
                        break;
                    }
                    // NOP means "resend on the same connection".
                    self.send_rfw(&mut stream).await?;
                }
                Ok(RfdFrame::Batch(header)) => {
                    if !self.consume_batch(&mut stream, &header).await? {
                        match self.resume().await? {
                            Some(reopened) => stream = reopened,
                            None => break,
                        }
                    }
                }
                Err(e) => {
                    warn!(rfw_id = self.rfw_id, error = %e, "invalid reply header");
                    match self.resume().await? {
                        Some(reopened) => stream = reopened,
                        None => break,
                    }
                }
            }
        }
        Ok(self.batch_rcv == self.cursor.remaining)
    }

    /// Read, decode, and enqueue one batch.
    ///
    /// Returns `Ok(false)` when the payload could not be read or decoded
    /// and the caller should reconnect-resume.
    async fn consume_batch(
        &mut self,
        stream: &mut TcpStream,
        header: &RfdHeader,
    ) -> Result<bool> {
        self.check_header(header);
        if header.payload_len > MAX_PAYLOAD_LEN {
            warn!(
                rfw_id = self.rfw_id,
                len = header.payload_len,
                "reply payload exceeds frame ceiling"
            );
            return Ok(false);
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        if let Err(e) = stream.read_exact(&mut payload).await {
            error!(
                rfw_id = self.rfw_id,
                error = %e,
                "connection closed before receiving payload"
            );
            return Ok(false);
        }

        let decoded = match decode_rfd_payload(&payload, header.protocol) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(rfw_id = self.rfw_id, error = %e, "unable to decode reply payload");
                return Ok(false);
            }
        };

        let row_count = decoded.data.len();
        let batch = Batch {
            rfw_id: self.rfw_id,
            bench_type: self.origin.bench_type.clone(),
            batch_id: header.last_batch,
            keys: decoded.keys,
            data: decoded.data,
        };
        self.queue
            .send(batch)
            .await
            .map_err(|_| Error::ShuttingDown)?;

        if self.batch_rcv < self.cursor.remaining {
            self.batch_rcv += 1;
            info!(
                rfw_id = self.rfw_id,
                bytes = header.payload_len,
                received = self.batch_rcv,
                expected = self.cursor.remaining,
                "batch received"
            );
        } else {
            warn!(rfw_id = self.rfw_id, "unexpected batch received");
        }

        if row_count < self.origin.batch_unit as usize {
            info!(
                rfw_id = self.rfw_id,
                rows = row_count,
                "short batch, source exhausted"
            );
            self.batch_rcv = self.cursor.remaining;
        }
        Ok(true)
    }

    /// Mismatches are logged but never fail the session.
    fn check_header(&self, header: &RfdHeader) {
        let expected = self.cursor.batch_id + self.batch_rcv;
        if header.last_batch != expected {
            warn!(
                rfw_id = self.rfw_id,
                expected,
                got = header.last_batch,
                "non-sequential batch received"
            );
        }
        if header.protocol != self.protocol {
            warn!(
                rfw_id = self.rfw_id,
                expected = self.protocol.label(),
                got = header.protocol.label(),
                "mismatching protocol received"
            );
        }
        if header.rfw_id != self.rfw_id {
            warn!(
                expected = self.rfw_id,
                got = header.rfw_id,
                "mismatching request id received"
            );
        }
    }

    /// Charge one retry, then reconnect and resend the adjusted RFW.
    ///
    /// Returns `Ok(None)` when the budget just ran out.
    async fn resume(&mut self) -> Result<Option<TcpStream>> {
        self.retries -= 1;
        if self.retries == 0 {
            return Ok(None);
        }

        self.cursor.batch_id += self.batch_rcv;
        self.cursor.remaining -= self.batch_rcv;
        self.batch_rcv = 0;
        info!(
            rfw_id = self.rfw_id,
            resume_at = self.cursor.batch_id,
            remaining = self.cursor.remaining,
            retries_left = self.retries,
            "reconnecting to resume"
        );
        let mut stream = TcpStream::connect(&self.remote_addr).await?;
        self.send_rfw(&mut stream).await?;
        Ok(Some(stream))
    }
}
