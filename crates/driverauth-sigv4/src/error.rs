//! Error types for request signing.
//!
//! Signing is a pure function of its inputs, so the only failures are inputs
//! the canonical construction cannot represent.

/// Errors that can occur while building a signed authorization header.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The server-supplied host cannot be used to derive a credential scope.
    #[error("invalid host `{host}`: {reason}")]
    InvalidHost {
        /// The host as received.
        host: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The timestamp is not in `yyyyMMdd'T'HHmmss'Z'` form.
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),

    /// The access key id is empty.
    #[error("access key id must not be empty")]
    EmptyAccessKeyId,
}
