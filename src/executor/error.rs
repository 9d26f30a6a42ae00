//! Executor error types

use std::fmt;

use thiserror::Error;

use super::schema::DataType;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Row source failures
#[derive(Error, Debug)]
pub enum SourceError {
    /// Reading the underlying input failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The background producer stopped abnormally
    #[error("Row producer failed: {0}")]
    ProducerFailed(String),

    /// Source used before `open` or after `close`
    #[error("Row source is closed")]
    Closed,
}

/// Executor errors
#[derive(Debug)]
pub enum ExecutorError {
    /// Row source error
    Source(SourceError),

    /// A row could not be decoded against the schema
    Decode { line: usize, message: String },

    /// Plan references something the schema or group record cannot provide
    Bind(String),

    /// Type mismatch during evaluation
    TypeMismatch {
        expected: DataType,
        got: Option<DataType>,
        context: String,
    },

    /// Invalid operation (e.g., division by zero)
    InvalidOperation(String),

    /// Column not found during binding
    ColumnNotFound(String),

    /// Column index out of bounds
    ColumnIndexOutOfBounds { index: usize, row_len: usize },

    /// Internal executor error
    Internal(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::Source(e) => write!(f, "source error: {}", e),
            ExecutorError::Decode { line, message } => {
                write!(f, "decode error at line {}: {}", line, message)
            }
            ExecutorError::Bind(msg) => write!(f, "bind error: {}", msg),
            ExecutorError::TypeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "type mismatch: expected {:?}, got {:?} in {}",
                    expected, got, context
                )
            }
            ExecutorError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            ExecutorError::ColumnNotFound(name) => write!(f, "column not found: {}", name),
            ExecutorError::ColumnIndexOutOfBounds { index, row_len } => {
                write!(
                    f,
                    "column index {} out of bounds (row has {} columns)",
                    index, row_len
                )
            }
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for ExecutorError {
    fn from(e: SourceError) -> Self {
        ExecutorError::Source(e)
    }
}
