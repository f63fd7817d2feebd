//! Error types for sqlweave

use thiserror::Error;

/// Result type alias for sqlweave operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for query construction and execution
#[derive(Debug, Error)]
pub enum SqlError {
    /// Bad argument to a capture or builder method
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// A table/join/condition specification could not be compiled.
    ///
    /// `index` is the position of the offending specification within its
    /// clause, `sketch` a short textual rendering of it.
    #[error("Invalid specification #{index}: {sketch}")]
    Specification { index: usize, sketch: String },

    /// Clause not supported by the active dialect
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Builder state invalid at build time
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record-like input could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Driver-level execution error, enriched with the command text
    #[cfg(feature = "postgres")]
    #[error("Execution error for `{command}`: {source}")]
    Execution {
        command: String,
        #[source]
        source: tokio_postgres::Error,
    },
}

impl SqlError {
    /// Create an argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create a specification error for the given clause position
    pub fn specification(index: usize, sketch: impl Into<String>) -> Self {
        Self::Specification {
            index,
            sketch: sketch.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-supported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Check if this is a not-supported error
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}
