//! Configuration for credential discovery.
//!
//! All configuration is driven by environment variables with fixed defaults
//! pointing at the well-known cloud metadata endpoints.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Default base URL of the container credentials endpoint.
pub const DEFAULT_CONTAINER_METADATA_BASE: &str = "http://169.254.170.2";

/// Default base URL of the instance-role credentials endpoint.
pub const DEFAULT_INSTANCE_METADATA_BASE: &str =
    "http://169.254.169.254/latest/meta-data/iam/security-credentials/";

/// Default timeout applied to each metadata request.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the authentication subsystem.
///
/// # Examples
///
/// ```
/// use driverauth_core::AuthConfig;
///
/// let config = AuthConfig::builder()
///     .container_metadata_base("http://127.0.0.1:9000".to_owned())
///     .build();
/// assert_eq!(config.log_level, "info");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Upper bound on each metadata HTTP request.
    #[builder(default = DEFAULT_METADATA_TIMEOUT)]
    pub metadata_timeout: Duration,

    /// Base URL the container relative URI is appended to.
    #[builder(default = String::from(DEFAULT_CONTAINER_METADATA_BASE))]
    pub container_metadata_base: String,

    /// Base URL of the instance-role credentials listing.
    #[builder(default = String::from(DEFAULT_INSTANCE_METADATA_BASE))]
    pub instance_metadata_base: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            container_metadata_base: String::from(DEFAULT_CONTAINER_METADATA_BASE),
            instance_metadata_base: String::from(DEFAULT_INSTANCE_METADATA_BASE),
            log_level: String::from("info"),
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `METADATA_TIMEOUT_MS` | `10000` |
    /// | `LOG_LEVEL` | `info` |
    ///
    /// An unparsable timeout keeps the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("METADATA_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => config.metadata_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %v, "ignoring invalid METADATA_TIMEOUT_MS"),
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}
