use thiserror::Error;

/// Error type shared by every batchwise crate.
#[derive(Debug, Error)]
pub enum BatchError {
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

    #[error("Invalid axis: {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Batch source is empty")]
    EmptyBatchSource,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type BatchResult<T> = Result<T, BatchError>;
