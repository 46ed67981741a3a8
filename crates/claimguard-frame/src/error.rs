use claimguard_core::ClaimError;
use thiserror::Error;

/// Errors raised while loading or reshaping a [`Frame`](crate::Frame).
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Ragged record on line {line}: expected {expected} fields, found {found}")]
    Ragged {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Unknown column `{0}`")]
    UnknownColumn(String),

    #[error("Duplicate column `{0}`")]
    DuplicateColumn(String),

    #[error("Column `{0}` is not numeric")]
    NotNumeric(String),

    #[error("Column `{0}` is not categorical")]
    NotCategorical(String),

    #[error("Column `{column}` still has {count} missing values")]
    MissingValues { column: String, count: usize },

    #[error("Column `{0}` has no values to impute from")]
    EmptyColumn(String),

    #[error("Column length mismatch: `{column}` has {found} rows, frame has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Matrix(#[from] ClaimError),
}

pub type FrameResult<T> = Result<T, FrameError>;
