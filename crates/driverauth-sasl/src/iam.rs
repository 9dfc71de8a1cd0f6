//! The cloud-IAM (`MONGODB-AWS`) conversation.
//!
//! Two rounds:
//!
//! 1. The client sends `{r: <32-byte nonce>, p: 'n'}`.
//! 2. The server answers `{h: <host>, s: <64-byte nonce>}` whose first half
//!    echoes the client nonce. The client resolves its credential, signs a
//!    `GetCallerIdentity` request for `h` and sends
//!    `{a: <authorization>, d: <timestamp>, t: <token>?}`.
//!
//! The conversation owns its state and consumes it on each transition, so a
//! failed or finished conversation can never be resumed.

use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use driverauth_core::{Bson, ClientCredential, Document};
use driverauth_sigv4::{AuthorizationHeader, SigningParams, region_for_host};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::credentials::CredentialResolver;
use crate::error::{AuthError, AuthResult};
use crate::mechanism::SaslMechanism;
use crate::metadata::MetadataSource;

/// Mechanism name advertised to the server.
pub const MECHANISM: &str = "MONGODB-AWS";

/// Length of the client nonce in bytes.
pub const CLIENT_NONCE_LEN: usize = 32;

/// Length of the server nonce in bytes.
pub const SERVER_NONCE_LEN: usize = 2 * CLIENT_NONCE_LEN;

/// The GS2 channel-binding flag `'n'`, sent as a 32-bit integer.
const NO_CHANNEL_BINDING: i32 = 0x6e;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Random client contribution to the nonce.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientNonce([u8; CLIENT_NONCE_LEN]);

impl ClientNonce {
    /// Generate a fresh nonce from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// The raw nonce bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn check_server_nonce(&self, server_nonce: &[u8]) -> AuthResult<()> {
        if server_nonce.len() != SERVER_NONCE_LEN {
            return Err(AuthError::InvalidServerNonce(format!(
                "expected {SERVER_NONCE_LEN} bytes, got {}",
                server_nonce.len()
            )));
        }
        if !bool::from(server_nonce[..CLIENT_NONCE_LEN].ct_eq(&self.0[..])) {
            return Err(AuthError::InvalidServerNonce(
                "server nonce does not start with the client nonce".to_owned(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClientNonce(..)")
    }
}

/// Where the conversation stands.
#[derive(Debug)]
enum Phase {
    NotStarted,
    AwaitingServerFirst(ClientNonce),
    AwaitingServerFinal,
    Failed,
}

/// One `MONGODB-AWS` conversation.
///
/// # Examples
///
/// ```no_run
/// use driverauth_core::{AuthConfig, ClientCredential, MechanismName};
/// use driverauth_sasl::{IamConversation, MetadataClient, SaslMechanism};
///
/// # async fn run() -> Result<(), driverauth_sasl::AuthError> {
/// let credential = ClientCredential::new(MechanismName::aws())
///     .with_username("AKID")
///     .with_password("SECRET");
/// let metadata = MetadataClient::new(&AuthConfig::default())?;
///
/// let mut conversation = IamConversation::new(&credential, &metadata);
/// let client_first = conversation.evaluate_challenge(&[]).await?;
/// assert!(!conversation.is_complete());
/// # let _ = client_first;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IamConversation<'a> {
    resolver: CredentialResolver<'a>,
    phase: Phase,
    nonce: fn() -> ClientNonce,
    clock: fn() -> String,
}

impl<'a> IamConversation<'a> {
    /// Start a conversation for `credential`, falling back to `metadata` for missing fields.
    #[must_use]
    pub fn new(credential: &'a ClientCredential, metadata: &'a dyn MetadataSource) -> Self {
        Self {
            resolver: CredentialResolver::new(credential, metadata),
            phase: Phase::NotStarted,
            nonce: ClientNonce::generate,
            clock: utc_timestamp,
        }
    }

    #[cfg(test)]
    fn with_fixed_inputs(mut self, nonce: fn() -> ClientNonce, clock: fn() -> String) -> Self {
        self.nonce = nonce;
        self.clock = clock;
        self
    }

    fn client_first(nonce: &ClientNonce) -> Vec<u8> {
        Document::new()
            .with("r", Bson::Binary(nonce.as_bytes().to_vec()))
            .with("p", Bson::Int32(NO_CHANNEL_BINDING))
            .to_bytes()
            .to_vec()
    }

    async fn client_final(
        &mut self,
        nonce: &ClientNonce,
        server_first: &[u8],
    ) -> AuthResult<Vec<u8>> {
        let challenge = Document::from_bytes(server_first)?;
        let host = challenge.get_str("h")?;
        let server_nonce = challenge.get_binary("s")?;
        nonce.check_server_nonce(server_nonce)?;
        // Reject a bad host before any credential lookup touches the network.
        region_for_host(host)?;

        let credential = self.resolver.resolve().await?;
        let timestamp = (self.clock)();
        let header = AuthorizationHeader::sign(&SigningParams {
            access_key_id: credential.access_key_id(),
            secret_key: credential.secret_key(),
            session_token: credential.session_token(),
            host,
            server_nonce,
            timestamp: &timestamp,
        })?;

        let mut message = Document::new()
            .with("a", Bson::String(header.to_string()))
            .with("d", Bson::String(timestamp));
        if let Some(token) = credential.session_token() {
            message.insert("t", Bson::String(token.expose_secret().to_owned()));
        }

        debug!(host, scope = header.credential_scope(), "built client final message");
        Ok(message.to_bytes().to_vec())
    }
}

#[async_trait]
impl SaslMechanism for IamConversation<'_> {
    fn name(&self) -> &str {
        MECHANISM
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    async fn evaluate_challenge(&mut self, challenge: &[u8]) -> AuthResult<Vec<u8>> {
        match std::mem::replace(&mut self.phase, Phase::Failed) {
            Phase::NotStarted => {
                let nonce = (self.nonce)();
                let message = Self::client_first(&nonce);
                self.phase = Phase::AwaitingServerFirst(nonce);
                debug!(mechanism = MECHANISM, "sent client first message");
                Ok(message)
            }
            Phase::AwaitingServerFirst(nonce) => {
                let message = self.client_final(&nonce, challenge).await?;
                self.phase = Phase::AwaitingServerFinal;
                Ok(message)
            }
            Phase::AwaitingServerFinal => Err(AuthError::TooManySteps {
                mechanism: MECHANISM.to_owned(),
            }),
            Phase::Failed => Err(AuthError::ConversationAborted),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::AwaitingServerFinal)
    }
}

/// Current UTC time in `yyyyMMdd'T'HHmmss'Z'` form.
#[must_use]
pub fn utc_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
