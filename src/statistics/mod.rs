//! Summary statistics computed inside the store.
//!
//! [`StatisticsEngine::describe_table`] issues one catalog query, then per
//! numeric column one aggregate query and (for non-empty columns) one rank
//! query for the quartiles. Columns are summarized concurrently on separate
//! pooled sessions, so there is no snapshot across columns: a table written
//! to mid-call can yield counts that disagree between columns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::Error;
use crate::query::Identifier;
use crate::storage::{Store, TableData};
use crate::types::NumericType;

pub mod percentile;

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONCURRENT_COLUMNS: usize = 4;

/// Statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub data_type: NumericType,
    pub count: u64,
    pub avg: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Per-table summary, columns in catalog order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub table: String,
    pub columns: Vec<ColumnSummary>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.column == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableSize {
    pub rows: u64,
    pub columns: u64,
}

#[derive(Debug, Clone)]
struct NumericColumn {
    name: Identifier,
    data_type: NumericType,
}

/// Computes table summaries against a [`Store`]. Holds no state between
/// calls; every call re-queries the store.
pub struct StatisticsEngine {
    store: Arc<dyn Store>,
    query_timeout: Duration,
    max_concurrent_columns: usize,
}

impl StatisticsEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_concurrent_columns: DEFAULT_MAX_CONCURRENT_COLUMNS,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::new(store)
            .with_query_timeout(config.engine.query_timeout())
            .with_max_concurrent_columns(config.column_concurrency())
    }

    /// Bound on each individual store round trip
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_columns(mut self, limit: usize) -> Self {
        self.max_concurrent_columns = limit.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.store.is_closed() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Whether a table or view with exactly this name exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool, Error> {
        let table = Identifier::parse(table)?;
        self.ensure_connected()?;
        with_timeout(self.query_timeout, self.store.table_exists(&table)).await
    }

    /// Row and column counts. A missing table is [`Error::TableNotFound`];
    /// see [`StatisticsEngine::table_size_or_empty`] for the lenient form.
    pub async fn table_size(&self, table: &str) -> Result<TableSize, Error> {
        let table = Identifier::parse(table)?;
        self.ensure_connected()?;

        let columns = with_timeout(self.query_timeout, self.store.columns(&table)).await?;
        if columns.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }
        let rows = with_timeout(self.query_timeout, self.store.row_count(&table)).await?;

        Ok(TableSize {
            rows,
            columns: columns.len() as u64,
        })
    }

    /// Like [`StatisticsEngine::table_size`], but any failure yields `(0, 0)`
    /// so an unloaded dataset reads the same as an empty one.
    pub async fn table_size_or_empty(&self, table: &str) -> TableSize {
        match self.table_size(table).await {
            Ok(size) => size,
            Err(e) => {
                warn!(table, error = %e, "table size unavailable, reporting empty");
                TableSize::default()
            }
        }
    }

    /// Summarize every numeric, non-primary-key column of the table.
    ///
    /// Any failure aborts the whole call and cancels the columns still in
    /// flight; partial descriptors are never returned.
    pub async fn describe_table(&self, table: &str) -> Result<TableDescriptor, Error> {
        let table = Identifier::parse(table)?;
        self.ensure_connected()?;

        let catalog = with_timeout(self.query_timeout, self.store.columns(&table)).await?;
        if catalog.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let mut numeric = Vec::new();
        for column in catalog {
            if column.primary_key {
                continue;
            }
            if let Some(data_type) = NumericType::from_declared(&column.data_type) {
                numeric.push(NumericColumn {
                    name: Identifier::from_catalog(column.name)?,
                    data_type,
                });
            }
        }
        debug!(%table, columns = numeric.len(), "numeric columns");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_columns));
        let mut tasks = JoinSet::new();
        let column_count = numeric.len();

        for (position, column) in numeric.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let table = table.clone();
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.query_timeout;
            let span = info_span!("summarize_column", table = %table, column = %column.name);

            tasks.spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| Error::QueryFailed("column scheduler closed".into()))?;
                    let summary = summarize_column(store.as_ref(), &table, column, timeout).await?;
                    Ok::<_, Error>((position, summary))
                }
                .instrument(span),
            );
        }

        // Returning early drops the JoinSet, which aborts the remaining tasks.
        let mut slots: Vec<Option<ColumnSummary>> = (0..column_count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (position, summary) =
                joined.map_err(|e| Error::QueryFailed(format!("column task failed: {}", e)))??;
            slots[position] = Some(summary);
        }

        let columns: Vec<ColumnSummary> = slots.into_iter().flatten().collect();
        info!(%table, columns = columns.len(), "table described");

        Ok(TableDescriptor {
            table: table.to_string(),
            columns,
        })
    }

    /// Full table contents, column-oriented.
    pub async fn fetch_table(&self, table: &str, limit: Option<u64>) -> Result<TableData, Error> {
        let table = Identifier::parse(table)?;
        self.ensure_connected()?;
        with_timeout(self.query_timeout, self.store.fetch_rows(&table, limit)).await
    }
}

async fn with_timeout<T, F>(timeout: Duration, query: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_) => Err(Error::QueryFailed(format!("query timed out after {:?}", timeout))),
    }
}

// The aggregate runs first: the rank targets depend on its count.
async fn summarize_column(
    store: &dyn Store,
    table: &Identifier,
    column: NumericColumn,
    timeout: Duration,
) -> Result<ColumnSummary, Error> {
    let aggregate = with_timeout(timeout, store.aggregate(table, &column.name)).await?;

    let targets = percentile::quartile_targets(aggregate.count);
    let quartiles = if targets.is_empty() {
        [None; 3]
    } else {
        let ranks = percentile::ranks_to_fetch(&targets);
        let fetched = with_timeout(timeout, store.values_at_ranks(table, &column.name, &ranks)).await?;
        let values = percentile::resolve_all(&targets, &fetched)?;
        [Some(values[0]), Some(values[1]), Some(values[2])]
    };

    debug!(count = aggregate.count, ?quartiles, "column summarized");

    Ok(ColumnSummary {
        column: column.name.to_string(),
        data_type: column.data_type,
        count: aggregate.count,
        avg: aggregate.avg,
        std: aggregate.std,
        min: aggregate.min,
        p25: quartiles[0],
        p50: quartiles[1],
        p75: quartiles[2],
        max: aggregate.max,
    })
}
