//! Error type for authentication attempts.

use driverauth_core::DocumentError;
use driverauth_sigv4::SigningError;

/// Errors that terminate an authentication attempt.
///
/// Every variant is fatal for the attempt. A caller that wants to retry must
/// start a new attempt, which gets a fresh conversation and nonce.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or inconsistent configuration, detected before any network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server nonce has the wrong length or does not echo the client nonce.
    #[error("Invalid server nonce: {0}")]
    InvalidServerNonce(String),

    /// The mechanism was asked to evaluate more challenges than it allows.
    #[error("Too many steps involved in the {mechanism} negotiation.")]
    TooManySteps {
        /// Mechanism name.
        mechanism: String,
    },

    /// The server and client disagree on where the conversation stands.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The metadata service could not supply credentials.
    #[error("failed to obtain credentials from {endpoint}: {reason}")]
    CredentialSource {
        /// URL that was queried.
        endpoint: String,
        /// Underlying cause, never containing secret values.
        reason: String,
    },

    /// The authorization header could not be computed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A payload or reply could not be decoded.
    #[error("malformed document: {0}")]
    Document(#[from] DocumentError),

    /// The server rejected a command.
    #[error("server error {code}: {message}")]
    Server {
        /// Server error code, `0` when absent.
        code: i32,
        /// Server error message.
        message: String,
    },

    /// The wire layer failed to deliver a command.
    #[error("transport error: {0}")]
    Transport(String),

    /// The conversation already failed and cannot continue.
    #[error("conversation aborted after an earlier failure")]
    ConversationAborted,
}

impl AuthError {
    /// Whether the error stems from configuration.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether the error is a protocol violation by either side.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::InvalidServerNonce(_)
                | Self::TooManySteps { .. }
                | Self::Protocol(_)
                | Self::Document(_)
                | Self::ConversationAborted
        )
    }

    /// Whether a brand-new attempt might succeed without a configuration change.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CredentialSource { .. } | Self::Transport(_))
    }
}

/// Convenience result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
