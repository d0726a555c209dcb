//! Batch file writer: one CSV file per received batch.

use crate::error::Result;
use crate::types::Batch;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write one batch as `<rfw_id>-<bench_type>-<batch_id>.csv` under `dir`,
/// creating the directory on first use. The first line is the key list,
/// every following line one row.
pub async fn write_batch(dir: &Path, batch: &Batch) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let filename = format!(
        "{}-{}-{}.csv",
        batch.rfw_id, batch.bench_type, batch.batch_id
    );
    let path = dir.join(filename);
    tokio::fs::write(&path, render_csv(batch)).await?;
    debug!(
        rfw_id = batch.rfw_id,
        batch = batch.batch_id,
        rows = batch.data.len(),
        path = %path.display(),
        "batch written"
    );
    Ok(path)
}

fn render_csv(batch: &Batch) -> String {
    let mut out = String::new();
    out.push_str(&batch.keys.join(","));
    out.push('\n');
    for row in &batch.data {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
