//! SASL conversation engine for driverauth.
//!
//! A connection authenticates by running one mechanism conversation over
//! `saslStart` / `saslContinue` commands. The centerpiece is the cloud-IAM
//! mechanism (`MONGODB-AWS`): it exchanges nonces with the server, resolves
//! credentials from explicit settings or the cloud metadata service, and
//! answers with a signed `GetCallerIdentity` authorization header.
//!
//! # Modules
//!
//! - [`authenticator`] - Drives a conversation over a [`CommandTransport`]
//! - [`mechanism`] - The [`SaslMechanism`] contract
//! - [`iam`] - The `MONGODB-AWS` conversation
//! - [`plain`] - The `PLAIN` conversation
//! - [`credentials`] - Explicit or metadata-derived credential resolution
//! - [`metadata`] - HTTP client for the metadata credential endpoints
//! - [`error`] - [`AuthError`] and its classification

pub mod authenticator;
pub mod credentials;
pub mod error;
pub mod iam;
pub mod mechanism;
pub mod metadata;
pub mod plain;

pub use authenticator::{Authenticator, CommandTransport};
pub use credentials::{Credential, CredentialOrigin, CredentialResolver};
pub use error::{AuthError, AuthResult};
pub use iam::{ClientNonce, IamConversation};
pub use mechanism::SaslMechanism;
pub use metadata::{MetadataClient, MetadataEndpoint, MetadataResponse, MetadataSource};
pub use plain::PlainConversation;
