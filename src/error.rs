//! Error types for the index.

use thiserror::Error;

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur in the index
#[derive(Error, Debug)]
pub enum IndexError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized tree was written with a different order than expected
    #[error("Order mismatch: stream has order {stored}, expected {expected}")]
    OrderMismatch {
        /// Order recorded in the stream header
        stored: i32,
        /// Order the caller asked to load with
        expected: i32,
    },

    /// Stream corruption detected (e.g., impossible node count)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// A node had the wrong kind for the requested operation
    #[error("Invalid node: {0}")]
    InvalidNode(String),
}

impl IndexError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid node error
    pub fn invalid_node(msg: impl Into<String>) -> Self {
        Self::InvalidNode(msg.into())
    }
}
