//! The single-step `PLAIN` mechanism.

use async_trait::async_trait;
use driverauth_core::ClientCredential;
use secrecy::ExposeSecret;

use crate::error::{AuthError, AuthResult};
use crate::mechanism::SaslMechanism;

/// Mechanism name advertised to the server.
pub const MECHANISM: &str = "PLAIN";

/// One `PLAIN` conversation: a single `\0username\0password` message.
#[derive(Debug)]
pub struct PlainConversation<'a> {
    credential: &'a ClientCredential,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Sent,
    Failed,
}

impl<'a> PlainConversation<'a> {
    /// Start a conversation for `credential`.
    #[must_use]
    pub fn new(credential: &'a ClientCredential) -> Self {
        Self {
            credential,
            phase: Phase::NotStarted,
        }
    }

    /// Reject settings that cannot produce a `PLAIN` message.
    pub fn check_configuration(credential: &ClientCredential) -> AuthResult<()> {
        if credential.has_explicit_pair() {
            Ok(())
        } else {
            Err(missing_pair())
        }
    }
}

fn missing_pair() -> AuthError {
    AuthError::Config("PLAIN requires both a username and a password".to_owned())
}

#[async_trait]
impl SaslMechanism for PlainConversation<'_> {
    fn name(&self) -> &str {
        MECHANISM
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    async fn evaluate_challenge(&mut self, _challenge: &[u8]) -> AuthResult<Vec<u8>> {
        match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::NotStarted => {}
            Phase::Sent => {
                return Err(AuthError::TooManySteps {
                    mechanism: MECHANISM.to_owned(),
                });
            }
            Phase::Failed => return Err(AuthError::ConversationAborted),
        }

        let (Some(username), Some(password)) =
            (self.credential.username(), self.credential.password())
        else {
            return Err(missing_pair());
        };

        let password = password.expose_secret();
        let mut message = Vec::with_capacity(2 + username.len() + password.len());
        message.push(0);
        message.extend_from_slice(username.as_bytes());
        message.push(0);
        message.extend_from_slice(password.as_bytes());
        self.phase = Phase::Sent;
        Ok(message)
    }

    fn is_complete(&self) -> bool {
        self.phase == Phase::Sent
    }
}
