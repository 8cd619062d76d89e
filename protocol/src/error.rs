use thiserror::Error;

/// Errors generated by the protocol library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated when a message envelope cannot be
    /// serialized or deserialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
