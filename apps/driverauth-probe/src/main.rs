//! driverauth probe - check that IAM credentials resolve and sign.
//!
//! Resolves credentials exactly as a `MONGODB-AWS` conversation would (explicit
//! environment variables first, then the metadata service), signs a locally
//! generated nonce for the given host and prints the authorization header.
//! Secrets are never printed.
//!
//! # Usage
//!
//! ```text
//! driverauth-probe sts.us-west-2.amazonaws.com
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AWS_ACCESS_KEY_ID` | *(unset)* | Explicit access key id |
//! | `AWS_SECRET_ACCESS_KEY` | *(unset)* | Explicit secret key |
//! | `AWS_SESSION_TOKEN` | *(unset)* | Explicit session token (needs both keys) |
//! | `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` | *(unset)* | Use the container endpoint |
//! | `METADATA_TIMEOUT_MS` | `10000` | Metadata request timeout |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use anyhow::{Context, Result};
use driverauth_core::{AuthConfig, ClientCredential};
use driverauth_sasl::iam::utc_timestamp;
use driverauth_sasl::{ClientNonce, CredentialResolver, MetadataClient};
use driverauth_sigv4::{AuthorizationHeader, SigningParams};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let host = std::env::args()
        .nth(1)
        .context("usage: driverauth-probe <host>")?;

    let config = AuthConfig::from_env();
    init_tracing(&config.log_level)?;

    let credential = ClientCredential::aws_from_env();
    CredentialResolver::check_configuration(&credential)
        .context("invalid credential settings")?;
    let metadata = MetadataClient::new(&config).context("failed to build metadata client")?;
    info!(endpoint = ?metadata.endpoint(), "resolving credentials");

    let resolved = CredentialResolver::new(&credential, &metadata)
        .resolve()
        .await
        .context("failed to resolve credentials")?;

    // Stand-in for the server: echo the client nonce and append its own half.
    let client_nonce = ClientNonce::generate();
    let mut server_nonce = client_nonce.as_bytes().to_vec();
    server_nonce.extend_from_slice(ClientNonce::generate().as_bytes());

    let timestamp = utc_timestamp();
    let header = AuthorizationHeader::sign(&SigningParams {
        access_key_id: resolved.access_key_id(),
        secret_key: resolved.secret_key(),
        session_token: resolved.session_token(),
        host: &host,
        server_nonce: &server_nonce,
        timestamp: &timestamp,
    })
    .with_context(|| format!("failed to sign for host {host}"))?;

    println!("authorization: {header}");
    println!("timestamp:     {timestamp}");
    println!("origin:        {:?}", resolved.origin());
    let token = if resolved.session_token().is_some() {
        "attached"
    } else {
        "none"
    };
    println!("session token: {token}");

    Ok(())
}
