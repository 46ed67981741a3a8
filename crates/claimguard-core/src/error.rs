use thiserror::Error;

/// Error type shared by the numeric and model crates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClaimError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Index out of bounds: index {index} for axis {axis} with size {size}")]
    IndexOutOfBounds {
        index: usize,
        axis: usize,
        size: usize,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Model not fitted: call fit() before {0}")]
    NotFitted(&'static str),

    #[error("Empty input")]
    EmptyInput,

    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),
}

impl ClaimError {
    pub fn param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ClaimError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type ClaimResult<T> = Result<T, ClaimError>;
