//! Error types for bundle building and verification

use thiserror::Error;

/// Result type for lantana-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, verifying or persisting bundles.
///
/// Policy failures such as low coherence are not errors: they are recorded
/// in the bundle's verification flags or in a `VerificationResult`.
#[derive(Debug, Error)]
pub enum Error {
    /// Data could not be canonicalized for hashing
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A bond with this ID is already registered
    #[error("bond already registered: {0}")]
    DuplicateBond(String),

    /// Bond input rejected before registration
    #[error("invalid bond: {0}")]
    InvalidBond(String),

    /// Fewer distinct node signatures than the bundle requires
    #[error("incomplete bundle: {signed} of {required} node signatures")]
    IncompleteBundle { signed: usize, required: usize },

    /// Required top-level bundle fields are absent
    #[error("malformed bundle: missing {}", missing.join(", "))]
    MalformedBundle { missing: Vec<String> },

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while persisting or loading a bundle
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bundle file is not valid JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for errors the caller can recover from by changing its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DuplicateBond(_) | Error::InvalidBond(_))
    }
}
