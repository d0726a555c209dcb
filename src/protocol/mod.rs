//! RFW/RFD wire protocol
//!
//! Length-delimited, marker-framed, dual-encoding request/reply protocol.
//! A connection carries exactly one request (RFW) and its reply stream
//! (RFDs); a `NOP` frame in place of a reply signals "resend your request".
//!
//! - [`header`] — bit-exact fixed-width frame headers
//! - [`payload`] — JSON and binary payload codecs

pub mod header;
pub mod payload;

use crate::error::ProtocolError;
use tracing::warn;

/// Marker opening every request header.
pub const RFW_MARKER: [u8; 3] = *b"RFW";

/// Marker opening every data reply header.
pub const RFD_MARKER: [u8; 3] = *b"RFD";

/// Marker of the failure frame ("could not process that; retry").
pub const NOP_MARKER: [u8; 3] = *b"NOP";

/// Ceiling on declared payload sizes, on both ends.
///
/// A header declaring more than this is a framing fault, not an
/// allocation request.
pub const MAX_PAYLOAD_LEN: u64 = 16 * 1024 * 1024;

/// Payload encoding carried in the 4-byte ASCII protocol field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// UTF-8 JSON payloads (`"JSON"`)
    Json,
    /// Field-tagged binary payloads (`"BUFF"`)
    Binary,
}

impl Protocol {
    /// Wire tag for this encoding.
    pub fn tag(self) -> [u8; 4] {
        match self {
            Protocol::Json => *b"JSON",
            Protocol::Binary => *b"BUFF",
        }
    }

    /// Decode a wire tag. Unknown tags fail.
    pub fn from_tag(tag: [u8; 4]) -> Result<Protocol, ProtocolError> {
        match &tag {
            b"JSON" => Ok(Protocol::Json),
            b"BUFF" => Ok(Protocol::Binary),
            _ => Err(ProtocolError::InvalidProtocolTag(tag)),
        }
    }

    /// Human-readable label (`"JSON"` / `"BUFF"`).
    pub fn label(self) -> &'static str {
        match self {
            Protocol::Json => "JSON",
            Protocol::Binary => "BUFF",
        }
    }

    /// Parse a user-supplied label.
    ///
    /// Anything other than `BUFF` falls back to JSON with a warning; wire
    /// tags stay strict, only operator input gets this leniency.
    pub fn from_label(label: &str) -> Protocol {
        match label {
            "BUFF" => Protocol::Binary,
            "JSON" => Protocol::Json,
            other => {
                warn!(label = other, "unknown protocol label, falling back to JSON");
                Protocol::Json
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for protocol in [Protocol::Json, Protocol::Binary] {
            assert_eq!(Protocol::from_tag(protocol.tag()).unwrap(), protocol);
        }
    }

    #[test]
    fn unknown_tag_fails() {
        let err = Protocol::from_tag(*b"GZIP").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidProtocolTag(_)));
    }

    #[test]
    fn labels_fall_back_to_json() {
        assert_eq!(Protocol::from_label("BUFF"), Protocol::Binary);
        assert_eq!(Protocol::from_label("JSON"), Protocol::Json);
        assert_eq!(Protocol::from_label("protobuf"), Protocol::Json);
        assert_eq!(Protocol::from_label(""), Protocol::Json);
    }
}
