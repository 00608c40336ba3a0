use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not connected to a database")]
    NotConnected,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => Error::NotConnected,
            other => Error::QueryFailed(other.to_string()),
        }
    }
}
