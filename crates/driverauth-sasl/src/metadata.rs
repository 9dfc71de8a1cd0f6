//! HTTP client for the cloud metadata credential endpoints.
//!
//! Two endpoint families exist. Containers expose credentials under a path
//! published in `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`; instances expose a
//! role listing whose single entry names the credentials path. The client
//! returns the raw credentials document and leaves field extraction to the
//! resolver.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use driverauth_core::AuthConfig;
use reqwest::Client;
use secrecy::SecretString;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Environment variable selecting the container endpoint.
pub const CONTAINER_RELATIVE_URI_ENV: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";

/// A fetched credentials document together with where it came from.
#[derive(Debug)]
pub struct MetadataResponse {
    /// URL the document was read from.
    pub endpoint: String,
    /// Document body. Holds secrets, so it stays wrapped.
    pub body: SecretString,
}

/// Something that can produce a credentials document.
#[async_trait]
pub trait MetadataSource: Send + Sync + fmt::Debug {
    /// Fetch the credentials document.
    async fn fetch_credentials_document(&self) -> AuthResult<MetadataResponse>;
}

/// Which metadata endpoint family to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEndpoint {
    /// Container credentials at a relative URI.
    Container {
        /// Path appended to the container base URL.
        relative_uri: String,
    },
    /// Instance-role credentials, discovered through the role listing.
    Instance,
}

impl MetadataEndpoint {
    /// Select the endpoint family from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(CONTAINER_RELATIVE_URI_ENV) {
            Ok(relative_uri) => Self::Container { relative_uri },
            Err(_) => Self::Instance,
        }
    }
}

/// [`MetadataSource`] backed by HTTP GET requests.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: Client,
    endpoint: MetadataEndpoint,
    container_base: String,
    instance_base: String,
    timeout: Duration,
}

impl MetadataClient {
    /// Create a client for the endpoint family selected by the environment.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        Self::with_endpoint(config, MetadataEndpoint::from_env())
    }

    /// Create a client for an explicit endpoint family.
    pub fn with_endpoint(config: &AuthConfig, endpoint: MetadataEndpoint) -> AuthResult<Self> {
        let http = Client::builder()
            .timeout(config.metadata_timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("failed to build metadata HTTP client: {e}")))?;

        let mut instance_base = config.instance_metadata_base.clone();
        if !instance_base.ends_with('/') {
            instance_base.push('/');
        }

        Ok(Self {
            http,
            endpoint,
            container_base: config.container_metadata_base.trim_end_matches('/').to_owned(),
            instance_base,
            timeout: config.metadata_timeout,
        })
    }

    /// The endpoint family this client queries.
    #[must_use]
    pub fn endpoint(&self) -> &MetadataEndpoint {
        &self.endpoint
    }

    async fn get_text(&self, url: &str) -> AuthResult<String> {
        debug!(endpoint = url, timeout = ?self.timeout, "querying metadata endpoint");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| source_error(url, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(source_error(url, format!("HTTP status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| source_error(url, describe(&e)))
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn fetch_credentials_document(&self) -> AuthResult<MetadataResponse> {
        let endpoint = match &self.endpoint {
            MetadataEndpoint::Container { relative_uri } => {
                if relative_uri.starts_with('/') {
                    format!("{}{relative_uri}", self.container_base)
                } else {
                    format!("{}/{relative_uri}", self.container_base)
                }
            }
            MetadataEndpoint::Instance => {
                let listing = self.get_text(&self.instance_base).await?;
                let role = listing.lines().next().map(str::trim).unwrap_or_default();
                if role.is_empty() {
                    return Err(source_error(
                        &self.instance_base,
                        "no instance role is attached".to_owned(),
                    ));
                }
                debug!(role, "discovered instance role");
                format!("{}{role}", self.instance_base)
            }
        };

        let body = self.get_text(&endpoint).await?;
        Ok(MetadataResponse {
            endpoint,
            body: SecretString::from(body),
        })
    }
}

fn source_error(endpoint: &str, reason: String) -> AuthError {
    AuthError::CredentialSource {
        endpoint: endpoint.to_owned(),
        reason,
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_owned()
    } else if err.is_connect() {
        "connection failed".to_owned()
    } else {
        err.to_string()
    }
}
