// src/lib.rs
pub mod config;
pub mod dataset;
pub mod error;
pub mod query;
pub mod statistics;
pub mod storage;
pub mod types;

pub use config::Config;
pub use dataset::{DatasetKind, DatasetManager, DatasetSpec, Selection};
pub use error::Error;
pub use query::{Dialect, Identifier};
pub use statistics::{ColumnSummary, StatisticsEngine, TableDescriptor, TableSize};
pub use storage::{connect, MySqlStore, SqliteStore, Store, TableData};
pub use types::{NumericType, Value};
