//! Core domain types: metrics, masks, sample values, requests, and batches.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One workload metric column.
///
/// The column order is fixed; every mask projection, reply key list, and
/// output file follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// CPU utilisation (integer)
    Cpu,
    /// Inbound network traffic (integer)
    NetIn,
    /// Outbound network traffic (integer)
    NetOut,
    /// Memory usage (float)
    Memory,
}

impl Metric {
    /// All metrics in wire/column order.
    pub const ALL: [Metric; 4] = [Metric::Cpu, Metric::NetIn, Metric::NetOut, Metric::Memory];

    /// Column name as used in reply key lists and the store schema.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::NetIn => "net_in",
            Metric::NetOut => "net_out",
            Metric::Memory => "memory",
        }
    }

    /// Mask bit for this metric (cpu=8, net_in=4, net_out=2, memory=1).
    pub fn bit(self) -> u8 {
        match self {
            Metric::Cpu => 0b1000,
            Metric::NetIn => 0b0100,
            Metric::NetOut => 0b0010,
            Metric::Memory => 0b0001,
        }
    }

    /// Look a metric up by its column name.
    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 4-bit column selector over [`Metric::ALL`].
///
/// Serializes as its raw integer value, which is also the wire form
/// (`wl_metrics`). Bits above the low four are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsMask(u8);

impl MetricsMask {
    /// Mask selecting every column.
    pub const ALL: MetricsMask = MetricsMask(0b1111);

    /// Build a mask from raw bits.
    pub fn new(bits: u8) -> MetricsMask {
        MetricsMask(bits)
    }

    /// Build a mask from a wire integer, keeping only the low 4 bits.
    pub fn from_wire(value: i32) -> MetricsMask {
        MetricsMask((value as u32 & 0xF) as u8)
    }

    /// Raw bit value, as carried on the wire.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether this metric's bit is set.
    pub fn contains(self, metric: Metric) -> bool {
        self.0 & metric.bit() != 0
    }

    /// Ordered projection of the enabled bits onto the column order.
    pub fn selected(self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    /// Ordered column names of the enabled bits.
    pub fn keys(self) -> Vec<&'static str> {
        self.selected().into_iter().map(Metric::name).collect()
    }

    /// True when no column is selected.
    pub fn is_empty(self) -> bool {
        self.0 & 0xF == 0
    }
}

/// One cell of a sample row.
///
/// `cpu`, `net_in`, and `net_out` are integers; `memory` is a float. The
/// untagged serde form keeps JSON rows as bare numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Integer cell
    Int(i64),
    /// Floating-point cell
    Float(f64),
}

impl SampleValue {
    /// Cell as an `i32`, truncating floats.
    pub fn as_i32(self) -> i32 {
        match self {
            SampleValue::Int(v) => v as i32,
            SampleValue::Float(v) => v as i32,
        }
    }

    /// Cell as an `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            SampleValue::Int(v) => v as f64,
            SampleValue::Float(v) => v,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Int(v) => write!(f, "{v}"),
            SampleValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One sample row, aligned to a key list.
pub type Row = Vec<SampleValue>;

/// A request for workload: the logical form carried by an RFW payload.
///
/// Kept immutable once issued; client-side resume progress lives in a
/// separate cursor and a fresh `Rfw` is rendered for each (re)send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rfw {
    /// Dataset label prefix to draw samples from
    pub bench_type: String,
    /// Column selector
    pub wl_metrics: MetricsMask,
    /// Rows per batch
    pub batch_unit: u32,
    /// 0-based index of the first requested batch
    pub batch_id: u32,
    /// Number of consecutive batches requested
    pub batch_size: u32,
}

impl Rfw {
    /// Validate the request fields.
    ///
    /// Both endpoints enforce this: the client driver before opening a
    /// connection, the server after decoding a payload.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.wl_metrics.is_empty() {
            return Err(ProtocolError::EmptyMetricsMask);
        }
        if self.batch_unit == 0 {
            return Err(ProtocolError::InvalidField("batch_unit"));
        }
        if self.batch_size == 0 {
            return Err(ProtocolError::InvalidField("batch_size"));
        }
        Ok(())
    }
}

/// One received batch, queued for the writer pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Correlation id of the request this batch answers
    pub rfw_id: u32,
    /// Dataset label the batch was drawn from
    pub bench_type: String,
    /// Index of this batch
    pub batch_id: u32,
    /// Ordered labels of the selected columns
    pub keys: Vec<String>,
    /// Rows, each aligned to `keys`
    pub data: Vec<Row>,
}
