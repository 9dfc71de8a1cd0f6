//! Drives a mechanism over `saslStart` / `saslContinue` commands.
//!
//! The authenticator owns the client's credential settings and a metadata
//! source. Each call to [`Authenticator::authenticate`] builds a brand-new
//! conversation, so retries never reuse a nonce or a cached credential.

use std::sync::Arc;

use async_trait::async_trait;
use driverauth_core::{AuthConfig, Bson, ClientCredential, Document, MechanismName};
use tracing::{debug, info, warn};

use crate::credentials::CredentialResolver;
use crate::error::{AuthError, AuthResult};
use crate::iam::IamConversation;
use crate::mechanism::SaslMechanism;
use crate::metadata::{MetadataClient, MetadataSource};
use crate::plain::PlainConversation;

/// Sends a command to the server and returns its reply.
///
/// Implemented by the connection layer. Authentication only needs
/// request/reply semantics on one connection.
#[async_trait]
pub trait CommandTransport: Send {
    /// Run `command` against `database`.
    async fn run_command(&mut self, database: &str, command: Document) -> AuthResult<Document>;
}

/// Authenticates connections with one configured credential.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: Arc<ClientCredential>,
    metadata: Arc<dyn MetadataSource>,
}

impl Authenticator {
    /// Create an authenticator whose metadata client follows `config` and the environment.
    pub fn new(credential: ClientCredential, config: &AuthConfig) -> AuthResult<Self> {
        let metadata = MetadataClient::new(config)?;
        Ok(Self::with_metadata_source(credential, Arc::new(metadata)))
    }

    /// Create an authenticator with an explicit metadata source.
    #[must_use]
    pub fn with_metadata_source(
        credential: ClientCredential,
        metadata: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            credential: Arc::new(credential),
            metadata,
        }
    }

    /// The configured credential settings.
    #[must_use]
    pub fn credential(&self) -> &ClientCredential {
        &self.credential
    }

    /// Build a fresh conversation for the configured mechanism.
    ///
    /// Configuration problems surface here, before any bytes are sent.
    pub fn create_mechanism(&self) -> AuthResult<Box<dyn SaslMechanism + '_>> {
        let mechanism = self.credential.mechanism();
        if mechanism.is_empty() {
            return Err(AuthError::Config(
                "no authentication mechanism is configured".to_owned(),
            ));
        }

        match mechanism.as_str() {
            MechanismName::MONGODB_AWS => {
                CredentialResolver::check_configuration(&self.credential)?;
                Ok(Box::new(IamConversation::new(
                    &self.credential,
                    self.metadata.as_ref(),
                )))
            }
            MechanismName::PLAIN => {
                PlainConversation::check_configuration(&self.credential)?;
                Ok(Box::new(PlainConversation::new(&self.credential)))
            }
            other => Err(AuthError::Config(format!(
                "unsupported authentication mechanism `{other}`"
            ))),
        }
    }

    /// Run one complete authentication attempt over `transport`.
    ///
    /// On error the connection must be treated as unusable.
    pub async fn authenticate<T>(&self, transport: &mut T) -> AuthResult<()>
    where
        T: CommandTransport + ?Sized,
    {
        let mechanism = self.credential.mechanism().as_str();
        match self.converse(transport).await {
            Ok(()) => {
                info!(
                    mechanism,
                    user = self.credential.username().unwrap_or("<derived>"),
                    "authentication succeeded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(mechanism, error = %e, "authentication failed");
                Err(e)
            }
        }
    }

    async fn converse<T>(&self, transport: &mut T) -> AuthResult<()>
    where
        T: CommandTransport + ?Sized,
    {
        let mut mechanism = self.create_mechanism()?;
        let source = self.credential.source();

        let payload = if mechanism.has_initial_response() {
            mechanism.evaluate_challenge(&[]).await?
        } else {
            Vec::new()
        };

        let start = Document::new()
            .with("saslStart", Bson::Int32(1))
            .with("mechanism", Bson::String(mechanism.name().to_owned()))
            .with("payload", Bson::Binary(payload));
        let mut reply = check_reply(transport.run_command(source, start).await?)?;
        let conversation_id = reply.get_i32("conversationId")?;
        debug!(conversation_id, mechanism = mechanism.name(), "sasl conversation started");

        while !reply.get_bool("done")? {
            if mechanism.is_complete() {
                return Err(AuthError::Protocol(
                    "no client response to challenge".to_owned(),
                ));
            }

            let response = mechanism.evaluate_challenge(reply.get_binary("payload")?).await?;
            let next = Document::new()
                .with("saslContinue", Bson::Int32(1))
                .with("conversationId", Bson::Int32(conversation_id))
                .with("payload", Bson::Binary(response));
            reply = check_reply(transport.run_command(source, next).await?)?;
            debug!(conversation_id, "sasl conversation continued");
        }

        if !mechanism.is_complete() {
            return Err(AuthError::Protocol(
                "server finished the conversation before the client".to_owned(),
            ));
        }
        Ok(())
    }
}

fn check_reply(reply: Document) -> AuthResult<Document> {
    let ok = reply.get("ok").and_then(Bson::as_f64).unwrap_or(0.0);
    if (ok - 1.0).abs() < f64::EPSILON {
        return Ok(reply);
    }

    let code = reply.get_i32("code").unwrap_or(0);
    let message = reply
        .get_str("errmsg")
        .unwrap_or("command failed without an error message")
        .to_owned();
    Err(AuthError::Server { code, message })
}
