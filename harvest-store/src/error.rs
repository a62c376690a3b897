//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An account secret names an environment variable that is not set.
    #[error("Secret for account {label} not found: environment variable {var} is not set")]
    MissingSecret {
        /// Account label.
        label: String,
        /// The variable that was looked up.
        var: String,
    },

    /// HTTP error talking to a sink.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A sink endpoint rejected a request.
    #[error("Sink error: {0}")]
    Sink(String),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Core error.
    #[error(transparent)]
    Core(#[from] harvest_core::CoreError),
}

impl StoreError {
    /// Returns true if the error came from the configuration file.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::MissingSecret { .. } | Self::Serialization(_)
        )
    }
}

impl From<StoreError> for harvest_core::CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Core(core) => core,
            other => harvest_core::CoreError::Other(other.to_string()),
        }
    }
}
