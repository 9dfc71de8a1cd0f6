//! Canonical request construction for Signature Version 4.
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! The request signed during authentication is synthetic (it is never sent
//! over HTTP), so the path and query are always the fixed values the server
//! reconstructs; only header normalization needs real work here.

use std::collections::BTreeMap;

/// Build the full canonical request string from its components.
///
/// # Examples
///
/// ```
/// use driverauth_sigv4::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "POST",
///     "/",
///     "",
///     &[("host", "sts.amazonaws.com")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("POST\n/\n\nhost:sts.amazonaws.com\n\nhost\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    let canonical_uri = if uri.is_empty() { "/" } else { uri };
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_uri}\n{query_string}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical headers block.
///
/// Only headers listed in `signed_headers` are included. Names are lowercased,
/// values trimmed with inner whitespace runs collapsed, and lines sorted by
/// name. Repeated names are joined with commas. No trailing newline.
///
/// # Examples
///
/// ```
/// use driverauth_sigv4::canonical::build_canonical_headers;
///
/// let result = build_canonical_headers(
///     &[("Host", "example.com"), ("X-Amz-Date", "20240101T120000Z")],
///     &["x-amz-date", "host"],
/// );
/// assert_eq!(result, "host:example.com\nx-amz-date:20240101T120000Z");
/// ```
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(name.to_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let mut sorted_signed: Vec<&str> = signed_headers.to_vec();
    sorted_signed.sort_unstable();

    sorted_signed
        .iter()
        .filter_map(|name| header_map.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the semicolon-separated, sorted list of signed header names.
///
/// # Examples
///
/// ```
/// use driverauth_sigv4::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
