//! Core types, documents and configuration for driverauth.
//!
//! This crate provides the building blocks shared by the signer and the SASL
//! engine: the structured [`Document`] exchanged with the server, the
//! driver-boundary [`ClientCredential`], metadata-client settings in
//! [`AuthConfig`], and the [`MechanismName`] identifying a mechanism.

pub mod config;
pub mod credential;
pub mod document;
mod error;
mod types;

pub use config::AuthConfig;
pub use credential::{ClientCredential, SESSION_TOKEN_PROPERTY};
pub use document::{Bson, Document};
pub use error::{DocumentError, DocumentResult};
pub use types::MechanismName;
