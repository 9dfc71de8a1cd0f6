//! The conversation contract shared by every mechanism.

use std::fmt;

use async_trait::async_trait;

use crate::error::AuthResult;

/// One client-side run of a SASL mechanism.
///
/// A conversation is created per authentication attempt and discarded
/// afterwards. The authenticator drives it by feeding each server challenge
/// to [`evaluate_challenge`](Self::evaluate_challenge) until the server
/// reports completion. When [`has_initial_response`](Self::has_initial_response)
/// is true, the first call receives an empty challenge and its output travels
/// with the start command.
#[async_trait]
pub trait SaslMechanism: Send + fmt::Debug {
    /// Mechanism name as sent to the server.
    fn name(&self) -> &str;

    /// Whether the client speaks first.
    fn has_initial_response(&self) -> bool;

    /// Compute the response to `challenge`.
    ///
    /// Any error ends the conversation; later calls keep failing.
    async fn evaluate_challenge(&mut self, challenge: &[u8]) -> AuthResult<Vec<u8>>;

    /// Whether the client has produced its last message.
    fn is_complete(&self) -> bool;
}
