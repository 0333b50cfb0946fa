//! Errors raised while interpreting backend payloads.

use thiserror::Error;

/// Errors that can occur when parsing values received from the backend or
/// from configuration.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Payload was not valid JSON for the expected shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field the client relies on was absent or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Currency code outside the supported set.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Role string outside `admin`, `user`, `guest`.
    #[error("unknown user role: {0}")]
    UnknownRole(String),

    /// Inline blob payload was not valid base64.
    #[error("invalid blob encoding: {0}")]
    BlobEncoding(#[from] base64::DecodeError),
}
