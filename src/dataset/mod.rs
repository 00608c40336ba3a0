//! Allow-listed datasets and the per-session dataset selection.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::statistics::{StatisticsEngine, TableDescriptor, TableSize};
use crate::storage::TableData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Classification,
    Regression,
}

/// A dataset callers may request. `name` is also its table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub kind: DatasetKind,
    /// Column the model predicts
    pub target: String,
}

impl DatasetSpec {
    pub fn new(name: impl Into<String>, kind: DatasetKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
        }
    }

    /// The bundled datasets
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("iris", DatasetKind::Classification, "class"),
            Self::new("boston", DatasetKind::Regression, "CRIM"),
            Self::new("autompg", DatasetKind::Regression, "mpg"),
            Self::new("wine", DatasetKind::Classification, "quality"),
        ]
    }
}

/// One row of the dataset overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    /// 1-based position in name order
    pub index: usize,
    pub name: String,
    pub loaded: bool,
    pub size: TableSize,
}

/// Dataset description plus its summary statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub dataset: String,
    #[serde(rename = "type")]
    pub kind: DatasetKind,
    pub target: String,
    pub summary: TableDescriptor,
}

/// Front door for dataset lookups: only allow-listed names reach the engine.
pub struct DatasetManager {
    engine: Arc<StatisticsEngine>,
    datasets: Vec<DatasetSpec>,
}

impl DatasetManager {
    pub fn new(engine: Arc<StatisticsEngine>, mut datasets: Vec<DatasetSpec>) -> Self {
        datasets.sort_by(|a, b| a.name.cmp(&b.name));
        datasets.dedup_by(|a, b| a.name == b.name);
        Self { engine, datasets }
    }

    /// Allow-listed datasets, sorted by name
    pub fn datasets(&self) -> &[DatasetSpec] {
        &self.datasets
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<&DatasetSpec, Error> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::UnknownDataset(name.to_string()))
    }

    async fn is_loaded(&self, name: &str) -> bool {
        match self.engine.table_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(dataset = name, error = %e, "existence check failed, treating as not loaded");
                false
            }
        }
    }

    /// Names of the datasets whose tables are present in the store
    pub async fn list_loaded(&self) -> Vec<String> {
        let mut loaded = Vec::new();
        for dataset in &self.datasets {
            if self.is_loaded(&dataset.name).await {
                loaded.push(dataset.name.clone());
            }
        }
        loaded
    }

    pub async fn overview(&self) -> Vec<DatasetOverview> {
        let mut rows = Vec::with_capacity(self.datasets.len());
        for (idx, dataset) in self.datasets.iter().enumerate() {
            let loaded = self.is_loaded(&dataset.name).await;
            let size = if loaded {
                self.engine.table_size_or_empty(&dataset.name).await
            } else {
                TableSize::default()
            };
            rows.push(DatasetOverview {
                index: idx + 1,
                name: dataset.name.clone(),
                loaded,
                size,
            });
        }
        rows
    }

    pub async fn summary(&self, name: &str) -> Result<TableDescriptor, Error> {
        let dataset = self.resolve(name)?;
        self.engine.describe_table(&dataset.name).await
    }

    pub async fn metadata(&self, name: &str) -> Result<DatasetMetadata, Error> {
        let dataset = self.resolve(name)?;
        let summary = self.engine.describe_table(&dataset.name).await?;
        Ok(DatasetMetadata {
            dataset: dataset.name.clone(),
            kind: dataset.kind,
            target: dataset.target.clone(),
            summary,
        })
    }

    pub async fn data(&self, name: &str, limit: Option<u64>) -> Result<TableData, Error> {
        let dataset = self.resolve(name)?;
        self.engine.fetch_table(&dataset.name, limit).await
    }
}

/// The dataset a caller's session currently has selected.
#[derive(Debug, Default)]
pub struct Selection {
    dataset: RwLock<Option<String>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.dataset.read().clone()
    }

    /// Select a dataset; names outside the allow-list are refused.
    pub fn select(&self, manager: &DatasetManager, name: &str) -> Result<(), Error> {
        let dataset = manager.resolve(name)?;
        *self.dataset.write() = Some(dataset.name.clone());
        Ok(())
    }

    pub fn clear(&self) {
        *self.dataset.write() = None;
    }
}
