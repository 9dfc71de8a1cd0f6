//! Signature Version 4 authorization headers for cloud-IAM authentication.
//!
//! The IAM mechanism proves possession of a credential by signing a
//! `GetCallerIdentity` request that the database server later replays. This
//! crate computes that signature. It is pure: no I/O, no clock and no
//! retained state. The caller supplies the timestamp and the server nonce.
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request and signed-header construction
//! - [`signer`] - Credential scope, key derivation and the rendered header
//! - [`error`] - Signing error type

pub mod canonical;
pub mod error;
pub mod signer;

pub use error::SigningError;
pub use signer::{AuthorizationHeader, SigningParams, hash_payload, region_for_host};
