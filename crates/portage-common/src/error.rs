//! Error taxonomy for warehouse transfers
//!
//! Every failure a transfer can surface maps to exactly one variant here.
//! `ExtractFailed` and `LoadFailed` are orchestration-level wraps that tag
//! which side of the transfer failed; the remaining variants describe what
//! went wrong inside a single extract or load operation.

use thiserror::Error;

/// Result type alias for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Failure taxonomy for extract, load, and transfer operations
#[derive(Error, Debug)]
pub enum TransferError {
    /// The warehouse identifier is outside the supported set. Raised by the
    /// central engine-kind validation before any connection is attempted.
    #[error("unsupported warehouse type: {0}")]
    UnsupportedEngine(String),

    /// Column metadata could not be retrieved from the row source.
    #[error("result schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// The engine signalled a read failure mid-stream. Distinct from the
    /// normal end-of-data signal; when this is raised no rows surface.
    #[error("row read failed after {rows_read} rows: {message}")]
    RowRead { rows_read: usize, message: String },

    /// A row carried a different number of values than the result declared
    /// columns.
    #[error("row has {actual} values but the result declares {expected} columns")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Establishing the engine connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The extract statement was rejected or could not be submitted.
    #[error("query failed: {0}")]
    Query(String),

    /// A row insert was rejected by the destination. The load aborts on the
    /// first such failure; rows already written stay written.
    #[error("insert failed: {0}")]
    Insert(String),

    /// Extraction failed; the load was never attempted.
    #[error("extract from source failed: {0}")]
    ExtractFailed(#[source] Box<TransferError>),

    /// Loading failed after a successful extraction. No rollback of rows
    /// committed before the failing one.
    #[error("load into destination failed: {0}")]
    LoadFailed(#[source] Box<TransferError>),
}

impl TransferError {
    /// Short machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::UnsupportedEngine(_) => "UNSUPPORTED_ENGINE",
            TransferError::SchemaUnavailable(_) => "SCHEMA_UNAVAILABLE",
            TransferError::RowRead { .. } => "ROW_READ_ERROR",
            TransferError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            TransferError::Connect(_) => "CONNECT_ERROR",
            TransferError::Query(_) => "QUERY_ERROR",
            TransferError::Insert(_) => "INSERT_ERROR",
            TransferError::ExtractFailed(_) => "EXTRACT_FAILED",
            TransferError::LoadFailed(_) => "LOAD_FAILED",
        }
    }

    /// Wrap an extract-side failure for the orchestrator.
    pub fn extract_failed(cause: TransferError) -> Self {
        TransferError::ExtractFailed(Box::new(cause))
    }

    /// Wrap a load-side failure for the orchestrator.
    pub fn load_failed(cause: TransferError) -> Self {
        TransferError::LoadFailed(Box::new(cause))
    }
}
