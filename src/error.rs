//! Error types for workload-relay
//!
//! The error tree separates three layers:
//! - [`Error`] — top-level failures surfaced to drivers and binaries
//! - [`ProtocolError`] — frame-level faults that stay inside a session's
//!   failure budget (answered with `NOP` or a reconnect, never fatal on
//!   their own)
//! - [`StoreError`] — sample-store lifecycle and query context

use thiserror::Error;

/// Result type alias for workload-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for workload-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "port")
        key: Option<String>,
    },

    /// Sample store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Wire protocol fault (framing, markers, payload decode)
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while fetching source datasets
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request file could not be parsed
    #[error("invalid request file: {0}")]
    InvalidRequestFile(String),

    /// A client session gave up on its request
    #[error("request {rfw_id:#010x} failed: {reason}")]
    RequestFailed {
        /// Correlation id of the abandoned request
        rfw_id: u32,
        /// Why the session gave up (budget exhausted, connect failure, ...)
        reason: String,
    },

    /// Shutdown in progress - not starting new work
    #[error("shutdown in progress")]
    ShuttingDown,
}

/// Frame-level protocol faults
///
/// Sessions answer these with a `NOP` frame (server) or a reconnect-resume
/// (client) and charge them against the per-session failure budget. Only
/// when the budget is exhausted does a session terminate because of them.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header marker is neither a known request nor reply marker
    #[error("invalid header marker {0:?}")]
    InvalidMarker([u8; 3]),

    /// Protocol tag is neither `JSON` nor `BUFF`
    #[error("invalid protocol tag {0:?}")]
    InvalidProtocolTag([u8; 4]),

    /// Metrics mask selects no columns
    #[error("metrics mask selects no columns")]
    EmptyMetricsMask,

    /// A numeric request field is out of range
    #[error("invalid request field: {0}")]
    InvalidField(&'static str),

    /// Declared payload length exceeds the frame ceiling
    #[error("payload length {len} exceeds limit {limit}")]
    OversizedPayload {
        /// Length declared in the header
        len: u64,
        /// Maximum accepted payload length
        limit: u64,
    },

    /// JSON payload failed to decode
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary payload failed to decode
    #[error("malformed binary payload: {0}")]
    Binary(#[from] prost::DecodeError),

    /// A reply names a column this endpoint does not know
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
}

/// Sample-store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open the store
    #[error("failed to open store: {0}")]
    ConnectionFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Bootstrap (schema creation or population) failed
    #[error("bootstrap failed: {0}")]
    BootstrapFailed(String),

    /// A source dataset could not be fetched
    #[error("unable to fetch {file}: status {status}")]
    SourceFetch {
        /// Dataset file that failed to download
        file: String,
        /// HTTP status returned by the source
        status: u16,
    },
}
