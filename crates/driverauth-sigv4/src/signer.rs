//! Signature Version 4 signing of the synthetic `GetCallerIdentity` request.
//!
//! The client never sends this request over HTTP. It computes the
//! `Authorization` header the request would carry and hands it to the
//! database server, which replays the request against the security token
//! service on the client's behalf. The flow:
//!
//! 1. Derive the region from the server-supplied host and build the
//!    credential scope `{date}/{region}/sts/aws4_request`.
//! 2. Build the canonical request over the fixed body and the signed headers,
//!    including the server nonce and the no-channel-binding flag.
//! 3. Build the string to sign from the timestamp, scope and canonical
//!    request hash.
//! 4. Derive the signing key from the secret key and compute the signature.
//!
//! The main entry point is [`AuthorizationHeader::sign`].

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, KeyInit, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::error::SigningError;

/// Signing algorithm identifier.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service the synthetic request targets.
pub const SERVICE: &str = "sts";

/// Body of the synthetic request.
pub const STS_REQUEST_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";

/// Content type of the synthetic request.
pub const STS_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Channel-binding flag; the client never binds to the channel.
pub const GS2_CB_FLAG: &str = "n";

/// Region used for the global endpoint and single-label hosts.
pub const DEFAULT_REGION: &str = "us-east-1";

const GLOBAL_STS_HOST: &str = "sts.amazonaws.com";
const MAX_HOST_LEN: usize = 255;
const TIMESTAMP_LEN: usize = 16;
const CONTENT_LENGTH: &str = "43";

type HmacSha256 = Hmac<Sha256>;

/// Inputs to a single signing operation.
///
/// Borrowed so that the secret key never leaves the caller's secret wrapper.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Access key id placed in the credential scope.
    pub access_key_id: &'a str,
    /// Secret key seeding the signing-key derivation.
    pub secret_key: &'a SecretString,
    /// Session token for temporary credentials.
    pub session_token: Option<&'a SecretString>,
    /// Host the server asked the client to sign for.
    pub host: &'a str,
    /// The full 64-byte server nonce.
    pub server_nonce: &'a [u8],
    /// UTC timestamp in `yyyyMMdd'T'HHmmss'Z'` form.
    pub timestamp: &'a str,
}

/// A computed `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    access_key_id: String,
    credential_scope: String,
    signed_headers: String,
    signature: String,
}

impl AuthorizationHeader {
    /// Sign the synthetic request described by `params`.
    ///
    /// Identical inputs always produce an identical header.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when the access key id is empty, the timestamp
    /// is malformed, or the host cannot yield a region.
    ///
    /// # Examples
    ///
    /// ```
    /// use driverauth_sigv4::{AuthorizationHeader, SigningParams};
    /// use secrecy::SecretString;
    ///
    /// let secret = SecretString::from("SECRET".to_owned());
    /// let nonce = [7u8; 64];
    /// let header = AuthorizationHeader::sign(&SigningParams {
    ///     access_key_id: "AKID",
    ///     secret_key: &secret,
    ///     session_token: None,
    ///     host: "sts.us-west-2.amazonaws.com",
    ///     server_nonce: &nonce,
    ///     timestamp: "20240101T120000Z",
    /// })
    /// .unwrap();
    /// assert_eq!(header.credential_scope(), "20240101/us-west-2/sts/aws4_request");
    /// assert!(header.to_string().starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
    /// ```
    pub fn sign(params: &SigningParams<'_>) -> Result<Self, SigningError> {
        if params.access_key_id.is_empty() {
            return Err(SigningError::EmptyAccessKeyId);
        }
        let date = date_of(params.timestamp)?;
        let region = region_for_host(params.host)?;
        let credential_scope = format!("{date}/{region}/{SERVICE}/aws4_request");

        let nonce_b64 = BASE64_STANDARD.encode(params.server_nonce);
        let token = params.session_token.map(|t| t.expose_secret());
        let headers = sts_headers(params.host, params.timestamp, &nonce_b64, token);
        let signed: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();

        let canonical_request = build_canonical_request(
            "POST",
            "/",
            "",
            &headers,
            &signed,
            &hash_payload(STS_REQUEST_BODY.as_bytes()),
        );
        let canonical_hash = hash_payload(canonical_request.as_bytes());
        let string_to_sign =
            build_string_to_sign(params.timestamp, &credential_scope, &canonical_hash);

        let signing_key = derive_signing_key(params.secret_key, date, &region, SERVICE);
        let signature = compute_signature(&signing_key, &string_to_sign);

        debug!(
            access_key_id = params.access_key_id,
            scope = %credential_scope,
            with_token = token.is_some(),
            "signed GetCallerIdentity request"
        );

        Ok(Self {
            access_key_id: params.access_key_id.to_owned(),
            credential_scope,
            signed_headers: build_signed_headers_string(&signed),
            signature,
        })
    }

    /// The credential scope, `{date}/{region}/sts/aws4_request`.
    #[must_use]
    pub fn credential_scope(&self) -> &str {
        &self.credential_scope
    }

    /// Semicolon-separated signed header names.
    #[must_use]
    pub fn signed_headers(&self) -> &str {
        &self.signed_headers
    }

    /// Hex-encoded signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key_id, self.credential_scope, self.signed_headers, self.signature
        )
    }
}

/// Derive the signing region from the host the server supplied.
///
/// # Errors
///
/// Returns [`SigningError::InvalidHost`] for empty or over-long hosts and
/// hosts with empty labels.
///
/// # Examples
///
/// ```
/// use driverauth_sigv4::region_for_host;
///
/// assert_eq!(region_for_host("sts.amazonaws.com").unwrap(), "us-east-1");
/// assert_eq!(region_for_host("sts.eu-west-1.amazonaws.com").unwrap(), "eu-west-1");
/// assert_eq!(region_for_host("localhost").unwrap(), "us-east-1");
/// assert!(region_for_host("sts..amazonaws.com").is_err());
/// ```
pub fn region_for_host(host: &str) -> Result<String, SigningError> {
    let invalid = |reason| SigningError::InvalidHost {
        host: host.to_owned(),
        reason,
    };

    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(invalid("host is longer than 255 bytes"));
    }
    if host.starts_with('.') || host.ends_with('.') {
        return Err(invalid("host starts or ends with a dot"));
    }
    if host.split('.').any(str::is_empty) {
        return Err(invalid("host contains an empty label"));
    }

    if host == GLOBAL_STS_HOST {
        return Ok(DEFAULT_REGION.to_owned());
    }
    Ok(host
        .split('.')
        .nth(1)
        .unwrap_or(DEFAULT_REGION)
        .to_owned())
}

/// Build the SigV4 string to sign.
///
/// ```text
/// AWS4-HMAC-SHA256\n
/// <timestamp>\n
/// <credential_scope>\n
/// <hex(SHA256(canonical_request))>
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the signing key through the HMAC-SHA256 chain.
///
/// ```text
/// DateKey              = HMAC-SHA256("AWS4" + secret_key, date)
/// DateRegionKey        = HMAC-SHA256(DateKey, region)
/// DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
/// SigningKey           = HMAC-SHA256(DateRegionServiceKey, "aws4_request")
/// ```
#[must_use]
pub fn derive_signing_key(
    secret_key: &SecretString,
    date: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let mut seed = Vec::with_capacity(4 + secret_key.expose_secret().len());
    seed.extend_from_slice(b"AWS4");
    seed.extend_from_slice(secret_key.expose_secret().as_bytes());
    let date_key = hmac_sha256(&seed, date.as_bytes());
    seed.fill(0);

    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Compute the hex-encoded HMAC-SHA256 signature of `data`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Hex-encoded SHA-256 of `payload`.
///
/// # Examples
///
/// ```
/// use driverauth_sigv4::hash_payload;
///
/// assert_eq!(
///     hash_payload(b"Action=GetCallerIdentity&Version=2011-06-15"),
///     "ab821ae955788b0e33ebd34c208442ccfc2d406e2edc5e7a39bd6458fbb4f843"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// The signed headers of the synthetic request, in canonical order.
fn sts_headers<'a>(
    host: &'a str,
    timestamp: &'a str,
    nonce_b64: &'a str,
    token: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut headers = vec![
        ("content-length", CONTENT_LENGTH),
        ("content-type", STS_CONTENT_TYPE),
        ("host", host),
        ("x-amz-date", timestamp),
    ];
    if let Some(token) = token {
        headers.push(("x-amz-security-token", token));
    }
    headers.push(("x-mongodb-gs2-cb-flag", GS2_CB_FLAG));
    headers.push(("x-mongodb-server-nonce", nonce_b64));
    headers
}

fn date_of(timestamp: &str) -> Result<&str, SigningError> {
    let bytes = timestamp.as_bytes();
    let well_formed = bytes.len() == TIMESTAMP_LEN
        && bytes[8] == b'T'
        && bytes[15] == b'Z'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..15].iter().all(u8::is_ascii_digit);
    if well_formed {
        Ok(&timestamp[..8])
    } else {
        Err(SigningError::InvalidTimestamp(timestamp.to_owned()))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
