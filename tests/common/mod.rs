//! Shared fixtures: a deterministic in-memory sample source and a server
//! harness bound to an ephemeral port.

#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use workload_relay::{
    ClientConfig, Metric, MetricsMask, Result, Row, SampleSource, SampleValue, ServerConfig,
    WorkloadServer,
};

/// Row `i` of the synthetic dataset, projected onto `metrics`:
/// `cpu = i`, `net_in = 1000 + i`, `net_out = 2000 + i`, `memory = i / 2.0`.
pub fn row_for(i: usize, metrics: MetricsMask) -> Row {
    metrics
        .selected()
        .into_iter()
        .map(|metric| match metric {
            Metric::Cpu => SampleValue::Int(i as i64),
            Metric::NetIn => SampleValue::Int(1000 + i as i64),
            Metric::NetOut => SampleValue::Int(2000 + i as i64),
            Metric::Memory => SampleValue::Float(i as f64 / 2.0),
        })
        .collect()
}

/// In-memory sample source holding `total` synthetic rows for any label.
pub struct MemorySource {
    pub total: usize,
}

#[async_trait]
impl SampleSource for MemorySource {
    async fn get_batch(
        &self,
        _bench_type: &str,
        metrics: MetricsMask,
        batch_unit: u32,
        batch_id: u32,
    ) -> Result<Vec<Row>> {
        let start = ((batch_unit as usize) * (batch_id as usize)).min(self.total);
        let end = (start + batch_unit as usize).min(self.total);
        Ok((start..end).map(|i| row_for(i, metrics)).collect())
    }
}

/// Spawn a server over a `MemorySource` on an ephemeral port.
///
/// Returns the bound address and the shutdown token.
pub async fn spawn_server(total_rows: usize) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = CancellationToken::new();

    let server = WorkloadServer::new(
        ServerConfig::default(),
        Arc::new(MemorySource { total: total_rows }),
    );
    let token = shutdown.clone();
    tokio::spawn(async move {
        server.serve(listener, token).await.expect("server failed");
    });

    (addr, shutdown)
}

/// Client config pointed at `addr`, writing under `output_dir`.
pub fn client_config(addr: SocketAddr, output_dir: &std::path::Path) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        output_dir: output_dir.to_path_buf(),
        ..ClientConfig::default()
    }
}

/// Sorted `(batch_id, contents)` pairs of every CSV in `dir`.
pub fn read_batch_files(dir: &std::path::Path) -> Vec<(u32, String)> {
    let mut files = Vec::new();
    if !dir.exists() {
        return files;
    }
    for entry in std::fs::read_dir(dir).expect("read output dir") {
        let path = entry.expect("dir entry").path();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .expect("file name");
        let batch_id: u32 = name
            .rsplit('-')
            .next()
            .and_then(|id| id.parse().ok())
            .expect("batch id suffix");
        let contents = std::fs::read_to_string(&path).expect("read batch file");
        files.push((batch_id, contents));
    }
    files.sort_by_key(|(id, _)| *id);
    files
}
