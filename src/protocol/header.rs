//! Fixed-width frame headers
//!
//! All integers are big-endian. Layouts are bit-exact:
//!
//! ```text
//! RFW header (19B) : "RFW" | rfw_id:u32 | protocol[4] | payload_size:u64
//! RFD header (23B) : marker[3] | rfw_id:u32 | last_batch:u32 | protocol[4] | payload_size:u64
//!   marker ∈ {"RFD","NOP"}; protocol ∈ {"JSON","BUFF"}
//! ```
//!
//! An RFD header is decoded by branching on the marker first: a `NOP`
//! frame is returned as its own variant and its remaining fields are never
//! interpreted as a batch descriptor.

use super::{NOP_MARKER, Protocol, RFD_MARKER, RFW_MARKER};
use crate::error::ProtocolError;

/// Length of an encoded request header.
pub const RFW_HEADER_LEN: usize = 19;

/// Length of an encoded reply header.
pub const RFD_HEADER_LEN: usize = 23;

/// Request frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfwHeader {
    /// Client-chosen correlation id
    pub rfw_id: u32,
    /// Payload encoding
    pub protocol: Protocol,
    /// Payload length in bytes
    pub payload_len: u64,
}

impl RfwHeader {
    /// Encode into the 19-byte wire form.
    pub fn encode(&self) -> [u8; RFW_HEADER_LEN] {
        let mut buf = [0u8; RFW_HEADER_LEN];
        buf[0..3].copy_from_slice(&RFW_MARKER);
        buf[3..7].copy_from_slice(&self.rfw_id.to_be_bytes());
        buf[7..11].copy_from_slice(&self.protocol.tag());
        buf[11..19].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    /// Decode the 19-byte wire form, validating marker and protocol tag.
    pub fn decode(buf: &[u8; RFW_HEADER_LEN]) -> Result<RfwHeader, ProtocolError> {
        let marker: [u8; 3] = buf[0..3].try_into().unwrap_or([0; 3]);
        if marker != RFW_MARKER {
            return Err(ProtocolError::InvalidMarker(marker));
        }
        let rfw_id = u32::from_be_bytes(buf[3..7].try_into().unwrap_or([0; 4]));
        let tag: [u8; 4] = buf[7..11].try_into().unwrap_or([0; 4]);
        let protocol = Protocol::from_tag(tag)?;
        let payload_len = u64::from_be_bytes(buf[11..19].try_into().unwrap_or([0; 8]));
        Ok(RfwHeader {
            rfw_id,
            protocol,
            payload_len,
        })
    }
}

/// Data reply frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfdHeader {
    /// Echo of the request's correlation id
    pub rfw_id: u32,
    /// Index of the batch this frame carries
    pub last_batch: u32,
    /// Payload encoding (echoes the request)
    pub protocol: Protocol,
    /// Payload length in bytes
    pub payload_len: u64,
}

impl RfdHeader {
    /// Encode into the 23-byte wire form.
    pub fn encode(&self) -> [u8; RFD_HEADER_LEN] {
        let mut buf = [0u8; RFD_HEADER_LEN];
        buf[0..3].copy_from_slice(&RFD_MARKER);
        buf[3..7].copy_from_slice(&self.rfw_id.to_be_bytes());
        buf[7..11].copy_from_slice(&self.last_batch.to_be_bytes());
        buf[11..15].copy_from_slice(&self.protocol.tag());
        buf[15..23].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }
}

/// A decoded reply frame: either a batch descriptor or the failure frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfdFrame {
    /// A real reply carrying one batch
    Batch(RfdHeader),
    /// The server could not process the request; resend it
    Nop,
}

/// Encode the failure frame: `NOP` marker, every other field zeroed.
pub fn encode_nop() -> [u8; RFD_HEADER_LEN] {
    let mut buf = [0u8; RFD_HEADER_LEN];
    buf[0..3].copy_from_slice(&NOP_MARKER);
    buf
}

/// Decode a 23-byte reply header.
///
/// Branches on the marker before anything else; `NOP` frames never reach
/// protocol-tag validation.
pub fn decode_rfd(buf: &[u8; RFD_HEADER_LEN]) -> Result<RfdFrame, ProtocolError> {
    let marker: [u8; 3] = buf[0..3].try_into().unwrap_or([0; 3]);
    if marker == NOP_MARKER {
        return Ok(RfdFrame::Nop);
    }
    if marker != RFD_MARKER {
        return Err(ProtocolError::InvalidMarker(marker));
    }
    let rfw_id = u32::from_be_bytes(buf[3..7].try_into().unwrap_or([0; 4]));
    let last_batch = u32::from_be_bytes(buf[7..11].try_into().unwrap_or([0; 4]));
    let tag: [u8; 4] = buf[11..15].try_into().unwrap_or([0; 4]);
    let protocol = Protocol::from_tag(tag)?;
    let payload_len = u64::from_be_bytes(buf[15..23].try_into().unwrap_or([0; 8]));
    Ok(RfdFrame::Batch(RfdHeader {
        rfw_id,
        last_batch,
        protocol,
        payload_len,
    }))
}
