//! Error types for Tally

use thiserror::Error;

/// Tally error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A quantity string could not be parsed, or its value is unusable
    #[error("Invalid quantity {value:?}: {reason}")]
    InvalidQuantity {
        /// Offending input
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Workload identity rejected
    #[error("Invalid workload: {message}")]
    InvalidWorkload {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// Checkpoint file could not be loaded or stored
    #[error("Checkpoint error: {message}")]
    Checkpoint {
        /// Error message
        message: String,
    },

    /// `CGroup` value could not be read or written
    #[error("CGroup error: {message}")]
    CGroup {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidQuantity`]
    pub fn quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for Tally operations
pub type Result<T> = std::result::Result<T, Error>;
