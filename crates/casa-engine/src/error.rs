use std::path::PathBuf;

use thiserror::Error;

/// All errors an engine backend can report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The path does not resolve to a dataset of the requested kind.
    #[error("no table or image at {0}")]
    NotFound(PathBuf),
    /// A dataset already exists where a new one was requested.
    #[error("dataset already exists: {0}")]
    AlreadyExists(PathBuf),
    /// The named column is not part of the table.
    #[error("unknown column: {0}")]
    NoSuchColumn(String),
    /// A row number beyond the end of the table.
    #[error("row {row} out of range (table has {nrows} rows)")]
    RowOutOfRange { row: usize, nrows: usize },
    /// The operation needs array-valued cells but the column holds scalars.
    #[error("column {0} does not hold arrays")]
    NotAnArray(String),
    /// Slice bounds that do not fit the array they address.
    #[error("invalid slice: {0}")]
    InvalidSlice(String),
    /// Query text the engine does not understand or cannot evaluate.
    #[error("cannot execute query: {0}")]
    Query(String),
    /// A value of an unexpected type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// The backend has already been closed.
    #[error("backend for {0} is closed")]
    Closed(String),
    /// An I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, EngineError>;
