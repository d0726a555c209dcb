//! Payload codecs for both wire encodings
//!
//! The logical payloads are [`Rfw`] (request) and [`RfdPayload`] (one batch
//! of rows plus its key list). `JSON` frames carry them as UTF-8 JSON
//! objects; `BUFF` frames carry the field-tagged binary messages below.
//!
//! The binary batch message always has all four workload fields. Senders
//! populate only the masked columns and receivers read only the columns
//! named by `keys`, so the schema is stable across mask choices.

use super::Protocol;
use crate::error::ProtocolError;
use crate::types::{Metric, MetricsMask, Rfw, Row, SampleValue};
use prost::Message;
use serde::{Deserialize, Serialize};

/// One decoded batch: ordered column labels and rows aligned to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfdPayload {
    /// Ordered labels of the selected columns
    pub keys: Vec<String>,
    /// Rows, each aligned to `keys`
    pub data: Vec<Row>,
}

/// Binary form of a request.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoRfw {
    /// Dataset label prefix
    #[prost(string, tag = "1")]
    pub bench_type: String,
    /// Metrics mask bits
    #[prost(int32, tag = "2")]
    pub wl_metrics: i32,
    /// Rows per batch
    #[prost(int32, tag = "3")]
    pub batch_unit: i32,
    /// First requested batch index
    #[prost(int32, tag = "4")]
    pub batch_id: i32,
    /// Number of requested batches
    #[prost(int32, tag = "5")]
    pub batch_size: i32,
}

/// Binary form of one batch reply.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoRfd {
    /// Ordered labels of the selected columns
    #[prost(string, repeated, tag = "1")]
    pub keys: Vec<String>,
    /// One message per row
    #[prost(message, repeated, tag = "2")]
    pub workload: Vec<ProtoWorkload>,
}

/// Binary form of one sample row. Only masked fields are populated.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoWorkload {
    /// CPU utilisation
    #[prost(int32, tag = "1")]
    pub cpu: i32,
    /// Inbound network traffic
    #[prost(int32, tag = "2")]
    pub net_in: i32,
    /// Outbound network traffic
    #[prost(int32, tag = "3")]
    pub net_out: i32,
    /// Memory usage
    #[prost(double, tag = "4")]
    pub memory: f64,
}

/// Encode a request payload.
pub fn encode_rfw(rfw: &Rfw, protocol: Protocol) -> Result<Vec<u8>, ProtocolError> {
    match protocol {
        Protocol::Json => Ok(serde_json::to_vec(rfw)?),
        Protocol::Binary => {
            let proto = ProtoRfw {
                bench_type: rfw.bench_type.clone(),
                wl_metrics: rfw.wl_metrics.bits() as i32,
                batch_unit: rfw.batch_unit as i32,
                batch_id: rfw.batch_id as i32,
                batch_size: rfw.batch_size as i32,
            };
            Ok(proto.encode_to_vec())
        }
    }
}

/// Decode and validate a request payload.
pub fn decode_rfw(payload: &[u8], protocol: Protocol) -> Result<Rfw, ProtocolError> {
    let rfw = match protocol {
        Protocol::Json => serde_json::from_slice::<Rfw>(payload)?,
        Protocol::Binary => {
            let proto = ProtoRfw::decode(payload)?;
            if proto.batch_unit < 0 {
                return Err(ProtocolError::InvalidField("batch_unit"));
            }
            if proto.batch_id < 0 {
                return Err(ProtocolError::InvalidField("batch_id"));
            }
            if proto.batch_size < 0 {
                return Err(ProtocolError::InvalidField("batch_size"));
            }
            Rfw {
                bench_type: proto.bench_type,
                wl_metrics: MetricsMask::from_wire(proto.wl_metrics),
                batch_unit: proto.batch_unit as u32,
                batch_id: proto.batch_id as u32,
                batch_size: proto.batch_size as u32,
            }
        }
    };
    rfw.validate()?;
    Ok(rfw)
}

/// Encode one batch reply payload.
pub fn encode_rfd(payload: &RfdPayload, protocol: Protocol) -> Result<Vec<u8>, ProtocolError> {
    match protocol {
        Protocol::Json => Ok(serde_json::to_vec(payload)?),
        Protocol::Binary => {
            let metrics = keys_to_metrics(&payload.keys)?;
            let workload = payload
                .data
                .iter()
                .map(|row| {
                    let mut message = ProtoWorkload::default();
                    for (metric, value) in metrics.iter().zip(row) {
                        match metric {
                            Metric::Cpu => message.cpu = value.as_i32(),
                            Metric::NetIn => message.net_in = value.as_i32(),
                            Metric::NetOut => message.net_out = value.as_i32(),
                            Metric::Memory => message.memory = value.as_f64(),
                        }
                    }
                    message
                })
                .collect();
            let proto = ProtoRfd {
                keys: payload.keys.clone(),
                workload,
            };
            Ok(proto.encode_to_vec())
        }
    }
}

/// Decode one batch reply payload.
pub fn decode_rfd_payload(
    payload: &[u8],
    protocol: Protocol,
) -> Result<RfdPayload, ProtocolError> {
    match protocol {
        Protocol::Json => Ok(serde_json::from_slice::<RfdPayload>(payload)?),
        Protocol::Binary => {
            let proto = ProtoRfd::decode(payload)?;
            let metrics = keys_to_metrics(&proto.keys)?;
            let data = proto
                .workload
                .iter()
                .map(|message| {
                    metrics
                        .iter()
                        .map(|metric| match metric {
                            Metric::Cpu => SampleValue::Int(message.cpu as i64),
                            Metric::NetIn => SampleValue::Int(message.net_in as i64),
                            Metric::NetOut => SampleValue::Int(message.net_out as i64),
                            Metric::Memory => SampleValue::Float(message.memory),
                        })
                        .collect()
                })
                .collect();
            Ok(RfdPayload {
                keys: proto.keys,
                data,
            })
        }
    }
}

fn keys_to_metrics(keys: &[String]) -> Result<Vec<Metric>, ProtocolError> {
    keys.iter()
        .map(|key| {
            Metric::from_name(key).ok_or_else(|| ProtocolError::UnknownColumn(key.clone()))
        })
        .collect()
}
