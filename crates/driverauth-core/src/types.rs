//! Shared identifiers.

use std::fmt;

/// Name of a SASL mechanism as advertised to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MechanismName(String);

impl MechanismName {
    /// Cloud-IAM request-signing mechanism.
    pub const MONGODB_AWS: &str = "MONGODB-AWS";
    /// Plain username/password mechanism.
    pub const PLAIN: &str = "PLAIN";

    /// Create a mechanism name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The cloud-IAM mechanism.
    #[must_use]
    pub fn aws() -> Self {
        Self(Self::MONGODB_AWS.to_owned())
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty (no mechanism configured).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for MechanismName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
