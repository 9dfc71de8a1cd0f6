//! Credential settings handed over from the driver boundary.
//!
//! A [`ClientCredential`] is what the connection string (or the application)
//! supplied: a mechanism, optionally a username and password, and mechanism
//! properties. Nothing here is resolved yet; the SASL engine decides per
//! attempt which values come from here and which from a metadata service.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::SecretString;
use tracing::debug;

use crate::types::MechanismName;

/// Mechanism property carrying an explicit session token.
pub const SESSION_TOKEN_PROPERTY: &str = "AWS_SESSION_TOKEN";

/// Default database that external mechanisms authenticate against.
pub const EXTERNAL_SOURCE: &str = "$external";

/// Credential settings configured for a client.
///
/// # Examples
///
/// ```
/// use driverauth_core::{ClientCredential, MechanismName};
///
/// let credential = ClientCredential::new(MechanismName::aws())
///     .with_username("AKID")
///     .with_password("SECRET");
/// assert_eq!(credential.username(), Some("AKID"));
/// assert!(credential.password().is_some());
/// ```
pub struct ClientCredential {
    mechanism: MechanismName,
    username: Option<String>,
    password: Option<SecretString>,
    source: String,
    properties: BTreeMap<String, SecretString>,
}

impl ClientCredential {
    /// Create credential settings for the given mechanism with no explicit values.
    #[must_use]
    pub fn new(mechanism: MechanismName) -> Self {
        Self {
            mechanism,
            username: None,
            password: None,
            source: EXTERNAL_SOURCE.to_owned(),
            properties: BTreeMap::new(),
        }
    }

    /// Set the explicit username (for the cloud-IAM mechanism, the access key id).
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the explicit password (for the cloud-IAM mechanism, the secret key).
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the database the conversation runs against.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set a mechanism property. Values are treated as secrets.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), SecretString::from(value.into()));
        self
    }

    /// Build settings for the cloud-IAM mechanism from the standard environment variables.
    ///
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`;
    /// absent variables are left unset so resolution falls back to the metadata service.
    #[must_use]
    pub fn aws_from_env() -> Self {
        let mut credential = Self::new(MechanismName::aws());

        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            credential = credential.with_username(v);
        }
        if let Ok(v) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            credential = credential.with_password(v);
        }
        if let Ok(v) = std::env::var(SESSION_TOKEN_PROPERTY) {
            credential = credential.with_property(SESSION_TOKEN_PROPERTY, v);
        }

        debug!(
            explicit_username = credential.username.is_some(),
            explicit_password = credential.password.is_some(),
            explicit_token = credential.properties.contains_key(SESSION_TOKEN_PROPERTY),
            "loaded credential settings from environment"
        );

        credential
    }

    /// The configured mechanism.
    #[must_use]
    pub fn mechanism(&self) -> &MechanismName {
        &self.mechanism
    }

    /// The explicit username, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The explicit password, if any.
    #[must_use]
    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    /// The database the conversation runs against.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Look up a mechanism property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&SecretString> {
        self.properties.get(name)
    }

    /// Whether both username and password were given explicitly.
    #[must_use]
    pub fn has_explicit_pair(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("source", &self.source)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}
