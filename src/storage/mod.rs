//! Store access layer: typed rows over a pooled SQL connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Error;
use crate::query::{Dialect, Identifier};
use crate::types::Value;

pub mod mysql;
pub mod sqlite;

pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;

/// A column as reported by the store's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub data_type: String,
    pub primary_key: bool,
}

/// Result of the single-pass aggregate query over one column.
/// Every float is `None` when the column holds no non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateRow {
    pub count: u64,
    pub avg: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// A value together with its 1-based position in ascending order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedValue {
    pub rank: u64,
    pub value: f64,
}

/// Column-oriented table contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub table: String,
    pub columns: Vec<ColumnData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnData {
    pub name: String,
    pub values: Vec<Value>,
}

impl TableData {
    /// Build from catalog column names and row-major cells.
    pub fn from_rows(table: &Identifier, names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut columns: Vec<ColumnData> = names
            .into_iter()
            .map(|name| ColumnData {
                name,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();
        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Read-only access to a relational store.
///
/// Implementations own a connection pool; every call checks out its own
/// session, so calls may run concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Whether a table or view with exactly this name exists
    async fn table_exists(&self, table: &Identifier) -> Result<bool, Error>;

    /// Catalog columns of the table, in declaration order. Empty when the
    /// table does not exist.
    async fn columns(&self, table: &Identifier) -> Result<Vec<CatalogColumn>, Error>;

    async fn row_count(&self, table: &Identifier) -> Result<u64, Error>;

    /// COUNT, AVG, population STD, MIN and MAX over the column's non-null values
    async fn aggregate(&self, table: &Identifier, column: &Identifier) -> Result<AggregateRow, Error>;

    /// Values at the given ranks when non-null values are numbered from 1 in
    /// ascending order. Ranks past the end are simply absent from the result.
    async fn values_at_ranks(
        &self,
        table: &Identifier,
        column: &Identifier,
        ranks: &[u64],
    ) -> Result<Vec<RankedValue>, Error>;

    /// All rows of the table, optionally limited
    async fn fetch_rows(&self, table: &Identifier, limit: Option<u64>) -> Result<TableData, Error>;

    /// Close the pool. Later calls fail with [`Error::NotConnected`].
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Open a store for the configured URL. `mysql://`/`mariadb://` URLs get a
/// [`MySqlStore`], `sqlite:` URLs a [`SqliteStore`].
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Store>, Error> {
    let acquire_timeout = Duration::from_millis(config.acquire_timeout_ms);
    let store: Arc<dyn Store> = if config.url.starts_with("mysql:") || config.url.starts_with("mariadb:") {
        Arc::new(
            MySqlStore::connect(
                &config.url,
                config.user.as_deref(),
                config.password.as_deref(),
                config.max_connections,
                acquire_timeout,
            )
            .await?,
        )
    } else if config.url.starts_with("sqlite:") {
        Arc::new(SqliteStore::connect(&config.url, config.max_connections, acquire_timeout).await?)
    } else {
        return Err(Error::Config(format!("Unsupported database URL: {}", config.url)));
    };

    info!(dialect = ?store.dialect(), max_connections = config.max_connections, "connected to store");
    Ok(store)
}

/// Convert a COUNT result, which drivers hand back as a signed integer.
pub(crate) fn count_from_i64(count: i64) -> Result<u64, Error> {
    u64::try_from(count).map_err(|_| Error::QueryFailed(format!("negative count returned: {}", count)))
}

pub(crate) fn rank_to_i64(rank: u64) -> Result<i64, Error> {
    i64::try_from(rank).map_err(|_| Error::QueryFailed(format!("rank out of range: {}", rank)))
}
