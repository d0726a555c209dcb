//! Sample store
//!
//! SQLite persistence for workload samples, behind the [`SampleSource`]
//! trait so that sessions never see the database directly.
//!
//! ## Submodules
//!
//! - [`bootstrap`] — schema creation and dataset population

mod bootstrap;

pub use bootstrap::DATASETS;

use crate::config::StoreConfig;
use crate::error::{Error, Result, StoreError};
use crate::types::{Metric, MetricsMask, Row, SampleValue};
use async_trait::async_trait;
use sqlx::Row as _;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Name of the samples table.
const TABLE: &str = "workload";

/// The query contract sessions depend on.
///
/// `get_batch` returns at most `batch_unit` rows, skipping
/// `batch_unit * batch_id` rows of the subset whose dataset label starts
/// with `bench_type`, projected onto the mask-selected columns in column
/// order. A short result means the source is exhausted.
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch the rows for one batch.
    async fn get_batch(
        &self,
        bench_type: &str,
        metrics: MetricsMask,
        batch_unit: u32,
        batch_id: u32,
    ) -> Result<Vec<Row>>;
}

/// SQLite-backed sample store.
pub struct SampleStore {
    pool: SqlitePool,
}

impl SampleStore {
    /// Open (creating if missing) the store at the configured path and
    /// ensure the schema exists.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            config.db_path.display()
        ))
        .map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(format!(
                "invalid database path: {e}"
            )))
        })?
        .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(e.to_string()))
        })?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Open a private in-memory store, mainly for tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            Error::Store(StoreError::ConnectionFailed(e.to_string()))
        })?;
        // One connection, or every pool checkout would see its own
        // empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(StoreError::ConnectionFailed(e.to_string())))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SampleSource for SampleStore {
    async fn get_batch(
        &self,
        bench_type: &str,
        metrics: MetricsMask,
        batch_unit: u32,
        batch_id: u32,
    ) -> Result<Vec<Row>> {
        let selected = metrics.selected();
        if selected.is_empty() {
            return Err(Error::Store(StoreError::QueryFailed(
                "no columns selected".into(),
            )));
        }

        // Columns are named individually; the order of the select list is
        // the order of the reply keys.
        let columns = metrics.keys().join(", ");
        let sql = format!(
            "SELECT {columns} FROM {TABLE} WHERE source LIKE ? ORDER BY id LIMIT ? OFFSET ?"
        );
        let offset = i64::from(batch_unit) * i64::from(batch_id);

        let rows = sqlx::query(&sql)
            .bind(format!("{bench_type}%"))
            .bind(i64::from(batch_unit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                selected
                    .iter()
                    .enumerate()
                    .map(|(i, metric)| {
                        let value = match metric {
                            Metric::Memory => SampleValue::Float(row.try_get::<f64, _>(i)?),
                            _ => SampleValue::Int(row.try_get::<i64, _>(i)?),
                        };
                        Ok(value)
                    })
                    .collect::<Result<Row>>()
            })
            .collect()
    }
}
