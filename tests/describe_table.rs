use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tablestats::statistics::percentile;
use tablestats::{
    DatasetManager, DatasetSpec, Error, NumericType, SqliteStore, StatisticsEngine, Store, TableSize, Value,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    engine: StatisticsEngine,
}

async fn fixture() -> Result<Fixture, Error> {
    let dir = tempfile::tempdir()?;
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("datasets.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

    for statement in [
        "CREATE TABLE measurements (
            id INTEGER PRIMARY KEY,
            label TEXT,
            reading DOUBLE,
            weight DECIMAL(6,2),
            qty INT,
            ratio FLOAT
        )",
        "INSERT INTO measurements (label, reading, weight, qty, ratio) VALUES
            ('a', 4.0, 10.50, 10, NULL),
            ('b', 1.0, 20.25, 20, NULL),
            ('c', 3.0, 30.00, 30, NULL),
            ('d', 2.0, 40.75, 40, NULL),
            ('e', NULL, 50.00, 50, NULL)",
        "CREATE TABLE ties (v INT)",
        "INSERT INTO ties (v) VALUES (5), (5), (1), (5)",
    ] {
        sqlx::query(statement).execute(&pool).await?;
    }

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let engine = StatisticsEngine::new(store).with_max_concurrent_columns(4);
    Ok(Fixture { _dir: dir, pool, engine })
}

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("statistic should be present");
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

#[tokio::test]
async fn describes_numeric_columns_in_catalog_order() -> Result<(), Error> {
    let fx = fixture().await?;
    let descriptor = fx.engine.describe_table("measurements").await?;

    assert_eq!(descriptor.table, "measurements");
    let columns: Vec<_> = descriptor
        .columns
        .iter()
        .map(|c| (c.column.as_str(), c.data_type))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("reading", NumericType::Double),
            ("weight", NumericType::Decimal),
            ("qty", NumericType::Int),
            ("ratio", NumericType::Float),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn even_count_quartiles_use_midpoints() -> Result<(), Error> {
    let fx = fixture().await?;
    let descriptor = fx.engine.describe_table("measurements").await?;

    // non-null readings are [1, 2, 3, 4]
    let reading = descriptor.column("reading").unwrap();
    assert_eq!(reading.count, 4);
    approx(reading.avg, 2.5);
    approx(reading.std, 1.25f64.sqrt());
    approx(reading.min, 1.0);
    approx(reading.p25, 1.5);
    approx(reading.p50, 2.5);
    approx(reading.p75, 3.5);
    approx(reading.max, 4.0);
    Ok(())
}

#[tokio::test]
async fn odd_count_quartiles_take_the_ceiling_rank() -> Result<(), Error> {
    let fx = fixture().await?;
    let descriptor = fx.engine.describe_table("measurements").await?;

    let weight = descriptor.column("weight").unwrap();
    assert_eq!(weight.count, 5);
    approx(weight.avg, 30.3);
    approx(weight.p25, 20.25);
    approx(weight.p50, 30.0);
    approx(weight.p75, 40.75);

    let qty = descriptor.column("qty").unwrap();
    approx(qty.p50, 30.0);
    approx(qty.std, 200f64.sqrt());
    Ok(())
}

#[tokio::test]
async fn all_null_column_reports_zero_count() -> Result<(), Error> {
    let fx = fixture().await?;
    let descriptor = fx.engine.describe_table("measurements").await?;

    let ratio = descriptor.column("ratio").unwrap();
    assert_eq!(ratio.count, 0);
    assert_eq!(ratio.avg, None);
    assert_eq!(ratio.p25, None);
    assert_eq!(ratio.max, None);
    Ok(())
}

#[tokio::test]
async fn tied_values_resolve_deterministically() -> Result<(), Error> {
    let fx = fixture().await?;
    let descriptor = fx.engine.describe_table("ties").await?;

    // sorted [1, 5, 5, 5]
    let v = descriptor.column("v").unwrap();
    approx(v.p25, 3.0);
    approx(v.p50, 5.0);
    approx(v.p75, 5.0);
    Ok(())
}

#[tokio::test]
async fn matches_in_memory_percentiles_on_a_larger_column() -> Result<(), Error> {
    let fx = fixture().await?;
    sqlx::query("CREATE TABLE samples (id INTEGER PRIMARY KEY, x DOUBLE)")
        .execute(&fx.pool)
        .await?;

    let mut values = Vec::new();
    for i in 0..151u64 {
        let x = ((i * 7919) % 211) as f64 / 4.0;
        values.push(x);
        sqlx::query("INSERT INTO samples (x) VALUES (?)")
            .bind(x)
            .execute(&fx.pool)
            .await?;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let descriptor = fx.engine.describe_table("samples").await?;
    let x = descriptor.column("x").unwrap();

    let direct: i64 = sqlx::query_scalar("SELECT COUNT(x) FROM samples").fetch_one(&fx.pool).await?;
    assert_eq!(x.count, direct as u64);

    approx(x.p25, percentile::from_sorted(&values, 0.25).unwrap());
    approx(x.p50, percentile::from_sorted(&values, 0.50).unwrap());
    approx(x.p75, percentile::from_sorted(&values, 0.75).unwrap());

    let (min, p25, p50, p75, max) = (
        x.min.unwrap(),
        x.p25.unwrap(),
        x.p50.unwrap(),
        x.p75.unwrap(),
        x.max.unwrap(),
    );
    assert!(min <= p25 && p25 <= p50 && p50 <= p75 && p75 <= max);
    Ok(())
}

#[tokio::test]
async fn repeated_and_sequential_runs_agree() -> Result<(), Error> {
    let fx = fixture().await?;
    let first = fx.engine.describe_table("measurements").await?;
    let second = fx.engine.describe_table("measurements").await?;
    assert_eq!(first, second);

    let sequential = StatisticsEngine::new(Arc::new(SqliteStore::new(fx.pool.clone())))
        .with_max_concurrent_columns(1)
        .describe_table("measurements")
        .await?;
    assert_eq!(first, sequential);
    Ok(())
}

#[tokio::test]
async fn missing_tables() -> Result<(), Error> {
    let fx = fixture().await?;

    assert!(!fx.engine.table_exists("iris").await?);
    assert!(matches!(fx.engine.describe_table("iris").await, Err(Error::TableNotFound(_))));
    assert!(matches!(fx.engine.table_size("iris").await, Err(Error::TableNotFound(_))));
    assert_eq!(fx.engine.table_size_or_empty("iris").await, TableSize { rows: 0, columns: 0 });
    Ok(())
}

#[tokio::test]
async fn table_size_counts_rows_and_columns() -> Result<(), Error> {
    let fx = fixture().await?;
    assert!(fx.engine.table_exists("measurements").await?);
    assert_eq!(
        fx.engine.table_size("measurements").await?,
        TableSize { rows: 5, columns: 6 }
    );
    Ok(())
}

#[tokio::test]
async fn injected_names_never_reach_the_store() -> Result<(), Error> {
    let fx = fixture().await?;

    for hostile in ["x; DROP TABLE measurements", "measurements\"; DROP TABLE ties; --"] {
        assert!(matches!(fx.engine.table_exists(hostile).await, Err(Error::InvalidIdentifier(_))));
        assert!(matches!(fx.engine.describe_table(hostile).await, Err(Error::InvalidIdentifier(_))));
    }

    assert!(fx.engine.table_exists("measurements").await?);
    assert!(fx.engine.table_exists("ties").await?);
    Ok(())
}

#[tokio::test]
async fn fetch_table_is_column_oriented() -> Result<(), Error> {
    let fx = fixture().await?;
    let data = fx.engine.fetch_table("ties", None).await?;

    assert_eq!(data.row_count(), 4);
    let mut v: Vec<i64> = data
        .column("v")
        .unwrap()
        .values
        .iter()
        .filter_map(|value| match value {
            Value::Int(i) => Some(*i),
            _ => None,
        })
        .collect();
    v.sort_unstable();
    assert_eq!(v, vec![1, 5, 5, 5]);
    Ok(())
}

#[tokio::test]
async fn closed_store_reports_not_connected() -> Result<(), Error> {
    let fx = fixture().await?;
    fx.engine.store().close().await;

    assert!(matches!(fx.engine.describe_table("measurements").await, Err(Error::NotConnected)));
    assert!(matches!(fx.engine.table_size("measurements").await, Err(Error::NotConnected)));
    Ok(())
}

#[tokio::test]
async fn dataset_manager_over_sqlite() -> Result<(), Error> {
    let fx = fixture().await?;
    sqlx::query("CREATE TABLE iris (id INTEGER PRIMARY KEY, petal_length DOUBLE, class TEXT)")
        .execute(&fx.pool)
        .await?;
    sqlx::query("INSERT INTO iris (petal_length, class) VALUES (1.4, 'setosa'), (4.7, 'versicolor'), (6.0, 'virginica')")
        .execute(&fx.pool)
        .await?;

    let manager = DatasetManager::new(Arc::new(fx.engine), DatasetSpec::defaults());
    assert_eq!(manager.list_loaded().await, vec!["iris".to_string()]);

    let overview = manager.overview().await;
    let iris = overview.iter().find(|row| row.name == "iris").unwrap();
    assert!(iris.loaded);
    assert_eq!(iris.size, TableSize { rows: 3, columns: 3 });

    let metadata = manager.metadata("iris").await?;
    assert_eq!(metadata.target, "class");
    let petal = metadata.summary.column("petal_length").unwrap();
    assert_eq!(petal.count, 3);
    approx(petal.p50, 4.7);

    assert!(matches!(manager.metadata("measurements").await, Err(Error::UnknownDataset(_))));
    Ok(())
}

#[tokio::test]
async fn long_column_names_from_the_catalog_are_summarized() -> Result<(), Error> {
    let fx = fixture().await?;
    let long = "c".repeat(70);
    sqlx::query(&format!("CREATE TABLE wide (id INTEGER PRIMARY KEY, x DOUBLE, {long} DOUBLE)"))
        .execute(&fx.pool)
        .await?;
    sqlx::query(&format!("INSERT INTO wide (x, {long}) VALUES (1.0, 2.0), (3.0, 4.0)"))
        .execute(&fx.pool)
        .await?;

    let descriptor = fx.engine.describe_table("wide").await?;
    let names: Vec<_> = descriptor.columns.iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["x", long.as_str()]);

    let column = descriptor.column(&long).unwrap();
    assert_eq!(column.count, 2);
    approx(column.avg, 3.0);
    approx(column.p50, 3.0);
    assert_eq!(fx.engine.table_size("wide").await?, TableSize { rows: 2, columns: 3 });
    Ok(())
}

#[tokio::test]
async fn table_lookup_ignores_case_consistently() -> Result<(), Error> {
    let fx = fixture().await?;

    assert!(fx.engine.table_exists("MEASUREMENTS").await?);
    assert!(fx.engine.table_exists("Ties").await?);
    assert_eq!(
        fx.engine.table_size("MEASUREMENTS").await?,
        fx.engine.table_size("measurements").await?
    );
    let upper = fx.engine.describe_table("MEASUREMENTS").await?;
    assert_eq!(upper.columns, fx.engine.describe_table("measurements").await?.columns);
    Ok(())
}

#[tokio::test]
async fn dataset_tables_created_with_other_casing_are_loaded() -> Result<(), Error> {
    let fx = fixture().await?;
    sqlx::query("CREATE TABLE Iris (id INTEGER PRIMARY KEY, petal_length DOUBLE, class TEXT)")
        .execute(&fx.pool)
        .await?;
    sqlx::query("INSERT INTO Iris (petal_length, class) VALUES (1.4, 'setosa'), (4.7, 'versicolor')")
        .execute(&fx.pool)
        .await?;

    let manager = DatasetManager::new(Arc::new(fx.engine), DatasetSpec::defaults());
    assert_eq!(manager.list_loaded().await, vec!["iris".to_string()]);
    let metadata = manager.metadata("iris").await?;
    assert_eq!(metadata.summary.column("petal_length").unwrap().count, 2);
    Ok(())
}
