//! Request sources for the client driver
//!
//! Requests come from either a batch CSV file (one request per record) or
//! a single inline description. Both are validated before any connection
//! is opened, so a request selecting no columns never reaches the wire.

use crate::error::{Error, Result};
use crate::protocol::Protocol;
use crate::types::{MetricsMask, Rfw};
use serde::Deserialize;
use std::path::Path;

/// One request to issue: encoding plus the logical RFW.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Payload encoding to use on the wire
    pub protocol: Protocol,
    /// The request itself
    pub rfw: Rfw,
}

impl RequestSpec {
    /// Build a spec from inline values, falling back to JSON for unknown
    /// protocol labels.
    pub fn single(
        protocol: &str,
        bench_type: &str,
        metrics: u8,
        batch_unit: u32,
        batch_id: u32,
        batch_size: u32,
    ) -> RequestSpec {
        RequestSpec {
            protocol: Protocol::from_label(protocol),
            rfw: Rfw {
                bench_type: bench_type.to_string(),
                wl_metrics: MetricsMask::new(metrics),
                batch_unit,
                batch_id,
                batch_size,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    protocol: String,
    bench_type: String,
    metrics: u8,
    batch_unit: u32,
    batch_id: u32,
    batch_size: u32,
}

/// Load requests from a batch CSV file with columns
/// `protocol, bench_type, metrics, batch_unit, batch_id, batch_size`.
pub fn load_request_file(path: &Path) -> Result<Vec<RequestSpec>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::InvalidRequestFile(format!("{}: {e}", path.display())))?;

    let mut specs = Vec::new();
    for (index, record) in reader.deserialize::<RawRequest>().enumerate() {
        // +2: one for the header line, one for 1-based numbering
        let line = index + 2;
        let raw =
            record.map_err(|e| Error::InvalidRequestFile(format!("line {line}: {e}")))?;
        let spec = RequestSpec {
            protocol: Protocol::from_label(&raw.protocol),
            rfw: Rfw {
                bench_type: raw.bench_type,
                wl_metrics: MetricsMask::new(raw.metrics),
                batch_unit: raw.batch_unit,
                batch_id: raw.batch_id,
                batch_size: raw.batch_size,
            },
        };
        spec.rfw
            .validate()
            .map_err(|e| Error::InvalidRequestFile(format!("line {line}: {e}")))?;
        specs.push(spec);
    }

    if specs.is_empty() {
        return Err(Error::InvalidRequestFile(format!(
            "{}: no requests found",
            path.display()
        )));
    }
    Ok(specs)
}
