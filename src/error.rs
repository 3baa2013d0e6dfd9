use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("User id is required")]
    MissingUserId,

    #[error("Transaction {0} not found")]
    TransactionNotFound(i64),

    #[error("Transaction store error: {0}")]
    Store(String),

    #[error("Dashboard aggregation failed: {0}")]
    AggregationFailed(String),

    #[error("No transactions to export")]
    NothingToExport,

    #[error("Insight generation failed: {0}")]
    GenerationFailed(String),

    #[error("Insight generator returned an empty response")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, InsightsError>;
