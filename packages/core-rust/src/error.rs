//! Error taxonomy for metadata extraction.

/// Errors surfaced by metadata parsing and host-value extraction.
///
/// None of these are fatal to request processing: attribute derivation
/// degrades to empty/zero values and keeps serving. Strict-mode parse
/// failures are logged once at start-up and never retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested host value is absent.
    #[error("value not found: {0}")]
    NotFound(String),
    /// An identity metadata blob violated structural constraints in strict mode.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),
    /// Caller-supplied input was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
