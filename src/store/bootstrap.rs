//! Store lifecycle: schema creation and dataset population.

use super::SampleStore;
use crate::config::StoreConfig;
use crate::error::{Error, Result, StoreError};
use tracing::{info, warn};

/// Source dataset labels, fetched as `<label>.csv` from the source URL.
pub const DATASETS: [&str; 4] = [
    "DVD-testing",
    "DVD-training",
    "NDBench-testing",
    "NDBench-training",
];

impl SampleStore {
    /// Create the samples table if it does not exist.
    pub(super) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workload (
                id INTEGER PRIMARY KEY,
                cpu INTEGER,
                net_in INTEGER,
                net_out INTEGER,
                memory REAL,
                source TEXT
            )
            "#,
        )
        .execute(self.pool())
        .await
        .map_err(|e| Error::Store(StoreError::BootstrapFailed(e.to_string())))?;
        Ok(())
    }

    /// Whether the store holds any samples at all.
    pub async fn is_populated(&self) -> Result<bool> {
        let populated: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workload LIMIT 1)")
                .fetch_one(self.pool())
                .await?;
        Ok(populated)
    }

    /// Populate the store from the source datasets if it is empty.
    ///
    /// A dataset that fails to download is logged and skipped; the others
    /// still load. No-op when samples are already present.
    pub async fn bootstrap(&self, config: &StoreConfig) -> Result<()> {
        if self.is_populated().await? {
            info!("store already populated, continuing");
            return Ok(());
        }

        info!("store is empty, populating");
        for dataset in DATASETS {
            match fetch_dataset(&config.source_url, dataset).await {
                Ok(body) => {
                    let rows = parse_dataset(dataset, &body)?;
                    info!(dataset, rows = rows.len(), "inserting dataset");
                    self.insert_samples(dataset, &rows).await?;
                }
                Err(e) => warn!(dataset, error = %e, "skipping dataset"),
            }
        }
        info!("store populated");
        Ok(())
    }

    /// Insert samples for one dataset label, in one transaction.
    ///
    /// Rows are `(cpu, net_in, net_out, memory)` tuples; insertion order
    /// is batch order.
    pub async fn insert_samples(
        &self,
        source: &str,
        rows: &[(i64, i64, i64, f64)],
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        for (cpu, net_in, net_out, memory) in rows {
            sqlx::query(
                "INSERT INTO workload (cpu, net_in, net_out, memory, source) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(cpu)
            .bind(net_in)
            .bind(net_out)
            .bind(memory)
            .bind(source)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn fetch_dataset(base_url: &str, dataset: &str) -> Result<String> {
    let url = format!("{base_url}{dataset}.csv");
    info!(dataset, "fetching dataset");
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        return Err(Error::Store(StoreError::SourceFetch {
            file: format!("{dataset}.csv"),
            status: response.status().as_u16(),
        }));
    }
    Ok(response.text().await?)
}

/// Parse one source CSV body into sample tuples.
///
/// Source columns are `CPU, Net_in, Net_out, Memory, Target`; the target
/// column is dropped, the dataset label takes its place.
fn parse_dataset(dataset: &str, body: &str) -> Result<Vec<(i64, i64, i64, f64)>> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            Error::Store(StoreError::BootstrapFailed(format!(
                "{dataset}.csv: {e}"
            )))
        })?;
        let parsed = parse_record(&record);
        match parsed {
            Some(row) => rows.push(row),
            None => {
                return Err(Error::Store(StoreError::BootstrapFailed(format!(
                    "{dataset}.csv: malformed record at line {}",
                    line + 2
                ))));
            }
        }
    }
    Ok(rows)
}

fn parse_record(record: &csv::StringRecord) -> Option<(i64, i64, i64, f64)> {
    let cpu = record.get(0)?.trim().parse().ok()?;
    let net_in = record.get(1)?.trim().parse().ok()?;
    let net_out = record.get(2)?.trim().parse().ok()?;
    let memory = record.get(3)?.trim().parse().ok()?;
    Some((cpu, net_in, net_out, memory))
}
