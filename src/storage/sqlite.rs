use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use super::{count_from_i64, rank_to_i64, AggregateRow, CatalogColumn, RankedValue, Store, TableData};
use crate::error::Error;
use crate::query::{Dialect, Identifier};
use crate::types::Value;

const DIALECT: Dialect = Dialect::Sqlite;

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url).map_err(|e| Error::Connection(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

// SQLite is dynamically typed, so decode by trying the storage classes in turn.
fn decode_cell(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

#[async_trait]
impl Store for SqliteStore {
    fn dialect(&self) -> Dialect {
        DIALECT
    }

    async fn table_exists(&self, table: &Identifier) -> Result<bool, Error> {
        let found: i64 = sqlx::query_scalar(DIALECT.table_exists_sql())
            .bind(table.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(found > 0)
    }

    async fn columns(&self, table: &Identifier) -> Result<Vec<CatalogColumn>, Error> {
        let rows = sqlx::query(DIALECT.columns_sql())
            .bind(table.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(CatalogColumn {
                name: row.try_get("name")?,
                // Columns declared without a type report an empty string
                data_type: row.try_get::<Option<String>, _>("data_type")?.unwrap_or_default(),
                primary_key: row.try_get::<i64, _>("is_pk")? != 0,
            });
        }
        Ok(columns)
    }

    async fn row_count(&self, table: &Identifier) -> Result<u64, Error> {
        let sql = DIALECT.row_count_sql(table);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        count_from_i64(count)
    }

    async fn aggregate(&self, table: &Identifier, column: &Identifier) -> Result<AggregateRow, Error> {
        let sql = DIALECT.aggregate_sql(table, column);
        debug!(%sql, "aggregate");
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;

        Ok(AggregateRow {
            count: count_from_i64(row.try_get("n")?)?,
            avg: row.try_get("mean")?,
            std: row
                .try_get::<Option<f64>, _>("spread")?
                .map(|variance| DIALECT.finish_spread(variance)),
            min: row.try_get("lo")?,
            max: row.try_get("hi")?,
        })
    }

    async fn values_at_ranks(
        &self,
        table: &Identifier,
        column: &Identifier,
        ranks: &[u64],
    ) -> Result<Vec<RankedValue>, Error> {
        if ranks.is_empty() {
            return Ok(Vec::new());
        }
        let sql = DIALECT.ranked_values_sql(table, column, ranks.len());
        debug!(%sql, ?ranks, "ranked values");

        let mut query = sqlx::query(&sql);
        for rank in ranks {
            query = query.bind(rank_to_i64(*rank)?);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            values.push(RankedValue {
                rank: count_from_i64(row.try_get("rank_no")?)?,
                value: row.try_get("value")?,
            });
        }
        Ok(values)
    }

    async fn fetch_rows(&self, table: &Identifier, limit: Option<u64>) -> Result<TableData, Error> {
        let columns = self.columns(table).await?;
        if columns.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let sql = DIALECT.select_all_sql(table, limit.is_some());
        let mut query = sqlx::query(&sql);
        if let Some(limit) = limit {
            query = query.bind(rank_to_i64(limit)?);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let cells = rows
            .iter()
            .map(|row| (0..columns.len()).map(|idx| decode_cell(row, idx)).collect())
            .collect();
        let names = columns.into_iter().map(|c| c.name).collect();
        Ok(TableData::from_rows(table, names, cells))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
