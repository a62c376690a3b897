//! Core error types for `ReportHarvest`.

use thiserror::Error;

/// Core error type for `ReportHarvest` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No source yielded a usable header row.
    #[error("No valid data: none of {sources} source(s) could be used")]
    NoValidData {
        /// How many sources were offered to the merge.
        sources: usize,
    },

    /// An artifact could not be read as tabular data.
    #[error("Parse error for {label}: {reason}")]
    Parse {
        /// Label of the source that failed.
        label: String,
        /// Why parsing failed.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data, e.g. an empty artifact.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A dataset sink rejected the write.
    #[error("Sink {sink} failed: {reason}")]
    Sink {
        /// Sink name.
        sink: String,
        /// Why the write failed.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Creates a parse error for the given source.
    pub fn parse(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Creates a sink error.
    pub fn sink(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Sink {
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}
