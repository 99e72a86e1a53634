//! Crate-wide error taxonomy
//!
//! Store failures are wrapped rather than leaked so the HTTP layer can map
//! everything persistence-related to a generic server failure while the
//! full context goes to the logs.

use crate::store::StoreError;

/// Errors surfaced by the capture pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No user exists for the given fingerprint.
    #[error("user not found")]
    UserNotFound,

    /// No endpoint exists for the given reference.
    #[error("endpoint not found")]
    EndpointNotFound,

    /// Missing or malformed caller input.
    #[error("{0}")]
    Validation(String),

    /// Request body exceeded the configured cap.
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// The body stream failed mid-read. The partial read is discarded.
    #[error("could not read request body")]
    BodyRead,

    /// A uniqueness constraint fired and the retry did not resolve it.
    #[error("duplicate record")]
    Conflict,

    /// The datastore failed.
    #[error("persistence failure")]
    Persistence(#[source] StoreError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Error::EndpointNotFound,
            StoreError::Conflict => Error::Conflict,
            other => Error::Persistence(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
