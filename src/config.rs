//! Configuration types for workload-relay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default port both endpoints use when none is configured.
pub const DEFAULT_PORT: u16 = 8888;

/// Default per-session failure/retry budget.
pub const DEFAULT_FAILURE_BUDGET: u32 = 5;

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on (default: "0.0.0.0")
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Port to listen on (default: 8888)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Malformed submissions tolerated per connection before it is closed
    /// (default: 5)
    #[serde(default = "default_failure_budget")]
    pub failure_budget: u32,

    /// Sample store settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_port(),
            failure_budget: default_failure_budget(),
            store: StoreConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` form used for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sample store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file (default: "workload.db")
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Skip population on startup and serve whatever the store holds
    #[serde(default)]
    pub skip_bootstrap: bool,

    /// Base URL the source datasets are fetched from
    #[serde(default = "default_source_url")]
    pub source_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            skip_bootstrap: false,
            source_url: default_source_url(),
        }
    }
}

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host to connect to (default: "127.0.0.1")
    #[serde(default = "default_remote_host")]
    pub host: String,

    /// Server port to connect to (default: 8888)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport/framing faults tolerated per request before giving up
    /// (default: 5)
    #[serde(default = "default_failure_budget")]
    pub retry_budget: u32,

    /// Directory received batches are written to (default: "batches")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Capacity of the batch ingress queue between sessions and the
    /// writer pool (default: 64)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            port: default_port(),
            retry_budget: default_failure_budget(),
            output_dir: default_output_dir(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ClientConfig {
    /// `host:port` form used for connecting.
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_failure_budget() -> u32 {
    DEFAULT_FAILURE_BUDGET
}

fn default_db_path() -> PathBuf {
    PathBuf::from("workload.db")
}

fn default_source_url() -> String {
    concat!(
        "https://raw.githubusercontent.com/",
        "haniehalipour/Online-Machine-Learning-for-Cloud-Resource-Provisioning-of-Microservice-Backend-Systems/",
        "master/Workload%20Data/"
    )
    .to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("batches")
}

fn default_queue_capacity() -> usize {
    64
}
