//! End-to-end authentication tests for driverauth.
//!
//! Conversations run against [`FakeServer`], an in-process stand-in for the
//! database server that issues nonces and verifies `MONGODB-AWS` signatures
//! by recomputing them. Metadata scenarios use a local `httptest` server.
//!
//! Tests that need a real cloud environment are marked `#[ignore]`:
//! ```text
//! cargo test -p driverauth-integration -- --ignored
//! ```

use std::collections::HashMap;
use std::sync::Once;

use async_trait::async_trait;
use driverauth_core::{Bson, Document};
use driverauth_sasl::{AuthError, AuthResult, CommandTransport};
use driverauth_sigv4::{AuthorizationHeader, SigningParams};
use secrecy::SecretString;
use tracing::debug;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

const CONVERSATION_ID: i32 = 1;
const AUTHENTICATION_FAILED: i32 = 18;

/// In-process server side of the `MONGODB-AWS` conversation.
#[derive(Debug)]
pub struct FakeServer {
    host: String,
    secrets: HashMap<String, String>,
    server_nonce: Option<Vec<u8>>,
    commands: Vec<String>,
    final_messages: Vec<Document>,
}

impl FakeServer {
    /// A server that asks clients to sign for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secrets: HashMap::new(),
            server_nonce: None,
            commands: Vec::new(),
            final_messages: Vec::new(),
        }
    }

    /// Register an access key the server accepts.
    #[must_use]
    pub fn with_key(mut self, access_key_id: &str, secret_key: &str) -> Self {
        self.secrets
            .insert(access_key_id.to_owned(), secret_key.to_owned());
        self
    }

    /// Names of the commands received, in order.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Decoded client final messages received.
    #[must_use]
    pub fn final_messages(&self) -> &[Document] {
        &self.final_messages
    }

    fn sasl_start(&mut self, command: &Document) -> AuthResult<Document> {
        if command.get_str("mechanism")? != "MONGODB-AWS" {
            return Ok(failure("unsupported mechanism"));
        }
        let client_first = Document::from_bytes(command.get_binary("payload")?)?;
        let client_nonce = client_first.get_binary("r")?;
        if client_nonce.len() != 32 || client_first.get_i32("p")? != 0x6e {
            return Ok(failure("malformed client first message"));
        }

        let entropy: [u8; 32] = rand::random();
        let mut server_nonce = client_nonce.to_vec();
        server_nonce.extend_from_slice(&entropy);
        self.server_nonce = Some(server_nonce.clone());

        let server_first = Document::new()
            .with("h", Bson::String(self.host.clone()))
            .with("s", Bson::Binary(server_nonce))
            .to_bytes()
            .to_vec();
        Ok(reply(false, server_first))
    }

    fn sasl_continue(&mut self, command: &Document) -> AuthResult<Document> {
        let Some(server_nonce) = self.server_nonce.take() else {
            return Ok(failure("no conversation in progress"));
        };
        let client_final = Document::from_bytes(command.get_binary("payload")?)?;
        let accepted = self.verify(&client_final, &server_nonce);
        self.final_messages.push(client_final);

        if accepted {
            Ok(reply(true, Vec::new()))
        } else {
            Ok(failure("Authentication failed."))
        }
    }

    fn verify(&self, client_final: &Document, server_nonce: &[u8]) -> bool {
        let (Ok(authorization), Ok(timestamp)) =
            (client_final.get_str("a"), client_final.get_str("d"))
        else {
            return false;
        };
        let Some(access_key_id) = authorization
            .strip_prefix("AWS4-HMAC-SHA256 Credential=")
            .and_then(|rest| rest.split('/').next())
        else {
            return false;
        };
        let Some(secret) = self.secrets.get(access_key_id) else {
            return false;
        };

        let secret_key = SecretString::from(secret.clone());
        let session_token = client_final
            .get_str("t")
            .ok()
            .map(|t| SecretString::from(t.to_owned()));
        let expected = AuthorizationHeader::sign(&SigningParams {
            access_key_id,
            secret_key: &secret_key,
            session_token: session_token.as_ref(),
            host: &self.host,
            server_nonce,
            timestamp,
        });

        matches!(expected, Ok(header) if header.to_string() == authorization)
    }
}

#[async_trait]
impl CommandTransport for FakeServer {
    async fn run_command(&mut self, database: &str, command: Document) -> AuthResult<Document> {
        let name = command
            .keys()
            .next()
            .ok_or_else(|| AuthError::Transport("empty command".to_owned()))?
            .to_owned();
        debug!(database, command = %name, "fake server received command");
        self.commands.push(name.clone());

        match name.as_str() {
            "saslStart" => self.sasl_start(&command),
            "saslContinue" => self.sasl_continue(&command),
            other => Err(AuthError::Transport(format!("unexpected command {other}"))),
        }
    }
}

fn reply(done: bool, payload: Vec<u8>) -> Document {
    Document::new()
        .with("conversationId", Bson::Int32(CONVERSATION_ID))
        .with("done", Bson::Boolean(done))
        .with("payload", Bson::Binary(payload))
        .with("ok", Bson::Double(1.0))
}

fn failure(message: &str) -> Document {
    Document::new()
        .with("ok", Bson::Double(0.0))
        .with("errmsg", Bson::String(message.to_owned()))
        .with("code", Bson::Int32(AUTHENTICATION_FAILED))
}

mod test_conversation;
mod test_metadata;
