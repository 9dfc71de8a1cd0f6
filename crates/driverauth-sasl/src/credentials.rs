//! Credential resolution for the IAM mechanism.
//!
//! Explicit settings win field by field. Anything missing comes from the
//! metadata credentials document, which is fetched at most once per
//! resolver. A resolver belongs to exactly one conversation, so nothing is
//! shared between attempts or connections.

use driverauth_core::{ClientCredential, SESSION_TOKEN_PROPERTY};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::metadata::{MetadataResponse, MetadataSource};

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOrigin {
    /// Every field came from explicit configuration.
    Explicit,
    /// At least one field came from the metadata service.
    Derived,
}

/// An access key, secret key and optional session token.
#[derive(Debug)]
pub struct Credential {
    access_key_id: String,
    secret_key: SecretString,
    session_token: Option<SecretString>,
    origin: CredentialOrigin,
}

impl Credential {
    /// The access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret key.
    #[must_use]
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    /// The session token of temporary credentials.
    #[must_use]
    pub fn session_token(&self) -> Option<&SecretString> {
        self.session_token.as_ref()
    }

    /// Where the credential came from.
    #[must_use]
    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMetadataCredentials {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
}

#[derive(Debug)]
struct MetadataCredentials {
    endpoint: String,
    access_key_id: Option<String>,
    secret_access_key: Option<SecretString>,
    token: Option<SecretString>,
}

impl MetadataCredentials {
    fn parse(response: MetadataResponse) -> AuthResult<Self> {
        let raw: RawMetadataCredentials = serde_json::from_str(response.body.expose_secret())
            .map_err(|e| AuthError::CredentialSource {
                endpoint: response.endpoint.clone(),
                // serde_json messages may quote the body, so report the position only.
                reason: format!(
                    "malformed credentials document ({:?} error at line {}, column {})",
                    e.classify(),
                    e.line(),
                    e.column()
                ),
            })?;

        Ok(Self {
            endpoint: response.endpoint,
            access_key_id: raw.access_key_id,
            secret_access_key: raw.secret_access_key.map(SecretString::from),
            token: raw.token.map(SecretString::from),
        })
    }

    fn missing(&self, field: &str) -> AuthError {
        AuthError::CredentialSource {
            endpoint: self.endpoint.clone(),
            reason: format!("credentials document has no `{field}`"),
        }
    }

    fn access_key_id(&self) -> AuthResult<&str> {
        self.access_key_id
            .as_deref()
            .ok_or_else(|| self.missing("AccessKeyId"))
    }

    fn secret_access_key(&self) -> AuthResult<SecretString> {
        self.secret_access_key
            .as_ref()
            .map(copy_secret)
            .ok_or_else(|| self.missing("SecretAccessKey"))
    }

    fn token(&self) -> AuthResult<SecretString> {
        self.token
            .as_ref()
            .map(copy_secret)
            .ok_or_else(|| self.missing("Token"))
    }
}

/// Resolves a [`Credential`] for one conversation.
#[derive(Debug)]
pub struct CredentialResolver<'a> {
    explicit: &'a ClientCredential,
    source: &'a dyn MetadataSource,
    document: Option<MetadataCredentials>,
}

impl<'a> CredentialResolver<'a> {
    /// Create a resolver over explicit settings and a metadata source.
    #[must_use]
    pub fn new(explicit: &'a ClientCredential, source: &'a dyn MetadataSource) -> Self {
        Self {
            explicit,
            source,
            document: None,
        }
    }

    /// Reject settings that can never resolve, without touching the network.
    ///
    /// A session token property is only honored alongside an explicit
    /// username and password.
    pub fn check_configuration(explicit: &ClientCredential) -> AuthResult<()> {
        if explicit.property(SESSION_TOKEN_PROPERTY).is_some() && !explicit.has_explicit_pair() {
            return Err(AuthError::Config(
                "The connection string contains auth properties and no username and password"
                    .to_owned(),
            ));
        }
        Ok(())
    }

    /// Resolve the credential, fetching the metadata document if any field needs it.
    ///
    /// The token is resolved first: when both username and password are
    /// explicit it is the explicit property (if any); otherwise it comes from
    /// the metadata document. The access key id and secret key then fall back
    /// to the document individually.
    pub async fn resolve(&mut self) -> AuthResult<Credential> {
        let explicit = self.explicit;
        let mut origin = CredentialOrigin::Explicit;

        let session_token = if explicit.has_explicit_pair() {
            explicit.property(SESSION_TOKEN_PROPERTY).map(copy_secret)
        } else {
            Self::check_configuration(explicit)?;
            origin = CredentialOrigin::Derived;
            Some(self.metadata().await?.token()?)
        };

        let access_key_id = match explicit.username() {
            Some(username) => username.to_owned(),
            None => {
                origin = CredentialOrigin::Derived;
                self.metadata().await?.access_key_id()?.to_owned()
            }
        };

        let secret_key = match explicit.password() {
            Some(password) => copy_secret(password),
            None => {
                origin = CredentialOrigin::Derived;
                self.metadata().await?.secret_access_key()?
            }
        };

        let session_token = session_token.filter(|t| !t.expose_secret().is_empty());

        debug!(
            access_key_id = %access_key_id,
            origin = ?origin,
            with_token = session_token.is_some(),
            "resolved credential"
        );

        Ok(Credential {
            access_key_id,
            secret_key,
            session_token,
            origin,
        })
    }

    async fn metadata(&mut self) -> AuthResult<&MetadataCredentials> {
        let document = match self.document.take() {
            Some(document) => document,
            None => {
                let response = self.source.fetch_credentials_document().await?;
                debug!(endpoint = %response.endpoint, "fetched credentials document");
                MetadataCredentials::parse(response)?
            }
        };
        Ok(self.document.insert(document))
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}
