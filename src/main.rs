//! tablestats CLI

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tablestats::{Config, DatasetManager, StatisticsEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tablestats")]
#[command(version = "0.1.0")]
#[command(about = "Summary statistics for tables in a SQL database")]
struct Args {
    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database URL, overriding the config file
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a table exists
    Exists { table: String },
    /// Row and column counts of a table
    Size { table: String },
    /// Summary statistics for the numeric columns of a table
    Describe { table: String },
    /// Configured datasets and whether they are loaded
    Datasets,
    /// Dataset description together with its summary statistics
    Metadata { dataset: String },
    /// Contents of a dataset
    Data {
        dataset: String,
        #[arg(long)]
        limit: Option<u64>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    config.validate()?;

    let store = tablestats::connect(&config.database).await?;
    let engine = Arc::new(StatisticsEngine::from_config(Arc::clone(&store), &config));
    let manager = DatasetManager::new(Arc::clone(&engine), config.datasets.clone());

    let outcome = match args.command {
        Command::Exists { table } => print_json(&engine.table_exists(&table).await?),
        Command::Size { table } => print_json(&engine.table_size(&table).await?),
        Command::Describe { table } => print_json(&engine.describe_table(&table).await?),
        Command::Datasets => print_json(&manager.overview().await),
        Command::Metadata { dataset } => print_json(&manager.metadata(&dataset).await?),
        Command::Data { dataset, limit } => print_json(&manager.data(&dataset, limit).await?),
    };

    store.close().await;
    tracing::debug!("store closed");
    outcome
}
