use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Null response from server for query: {0}")]
    NullResponse(String),
    #[error("Backend execution failed: {0}")]
    BackendExecution(String),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Row arity mismatch: expected {expected} values, got {actual}")]
    RowArity { expected: usize, actual: usize },
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Sink error: {0}")]
    Sink(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
