//! Portal-specific error types.

use harvest_fetch::FetchError;
use thiserror::Error;

/// Errors specific to the portal binding.
#[derive(Debug, Error)]
pub enum PortalError {
    /// A configured strategy id is not known.
    #[error("Unknown acquisition strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy id appears more than once.
    #[error("Acquisition strategy listed twice: {0}")]
    DuplicateStrategy(String),

    /// No strategies were configured.
    #[error("No acquisition strategies configured")]
    NoStrategies,

    /// A discovered or configured URL could not be resolved.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Captured in-page bytes were not valid base64.
    #[error("Capture decode failed: {0}")]
    CaptureDecode(#[from] base64::DecodeError),

    /// The portal descriptor is unusable.
    #[error("Invalid portal configuration: {0}")]
    Config(#[from] harvest_core::CoreError),

    /// HTTP client setup failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] harvest_fetch::HttpError),
}

impl From<PortalError> for FetchError {
    fn from(e: PortalError) -> Self {
        match e {
            PortalError::Http(http) => FetchError::Http(http),
            PortalError::Config(core) => FetchError::Core(core),
            other => FetchError::Navigation(other.to_string()),
        }
    }
}
