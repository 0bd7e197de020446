//! Canonical request construction for SigV4.
//!
//! - [Create a canonical request](https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html#create-canonical-request)

use std::fmt::Write;

use http::HeaderMap;
use http::Method;
use percent_encoding::utf8_percent_encode;
use relaysign_core::{Result, SigningRequest};

use crate::constants::{AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET};

/// Headers that never take part in the signature.
///
/// They are either rewritten by the transport or by proxies on the way, so
/// signing them would make the signature fragile.
const UNSIGNABLE_HEADERS: &[&str] = &[
    "authorization",
    "connection",
    "content-length",
    "expect",
    "transfer-encoding",
    "user-agent",
    "x-amzn-trace-id",
];

/// Check whether the header is signed by default.
///
/// `host`, `content-type`, `content-md5` and every `x-amz-*` header are signed.
pub fn is_signed_header(name: &str) -> bool {
    matches!(name, "host" | "content-type" | "content-md5") || name.starts_with("x-amz-")
}

/// Check whether the header may be signed at all.
pub fn is_signable_header(name: &str) -> bool {
    !UNSIGNABLE_HEADERS.contains(&name)
}

/// Build the canonical request string.
///
/// Every header in `headers` is signed, so callers must pass only the headers
/// they want covered by the signature. The output layout is:
///
/// ```text
/// METHOD
/// CANONICAL_URI
/// CANONICAL_QUERY
/// CANONICAL_HEADERS (one `name:value\n` line per header)
///
/// SIGNED_HEADERS
/// PAYLOAD_HASH
/// ```
pub fn build(
    method: &Method,
    path: &str,
    query: &[(String, String)],
    headers: &HeaderMap,
    payload_hash: &str,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{method}")?;
    writeln!(f, "{}", canonical_uri(path))?;
    writeln!(f, "{}", canonical_query(query))?;

    let names = sorted_header_names(headers);
    for name in names.iter() {
        writeln!(f, "{}:{}", name, canonical_header_value(headers, name)?)?;
    }
    writeln!(f)?;
    writeln!(f, "{}", names.join(";"))?;
    write!(f, "{payload_hash}")?;

    Ok(f)
}

/// Build the `;` joined, sorted list of signed header names.
pub fn signed_headers(headers: &HeaderMap) -> String {
    sorted_header_names(headers).join(";")
}

/// Encode the path with AWS UriEncode.
///
/// Valid `%XX` escapes already in the path are kept with upper-case hex, so
/// `%2F` stays inside its segment instead of becoming a separator. Every other
/// byte outside the unreserved set is encoded, including a `%` that does not
/// start an escape.
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let bytes = path.as_bytes();
    let mut f = String::with_capacity(path.len());
    let (mut start, mut idx) = (0, 0);
    while idx < bytes.len() {
        let escaped = bytes[idx] == b'%'
            && idx + 2 < bytes.len()
            && bytes[idx + 1].is_ascii_hexdigit()
            && bytes[idx + 2].is_ascii_hexdigit();
        if !escaped {
            idx += 1;
            continue;
        }

        f.extend(utf8_percent_encode(&path[start..idx], &AWS_URI_ENCODE_SET));
        f.push('%');
        f.push(bytes[idx + 1].to_ascii_uppercase() as char);
        f.push(bytes[idx + 2].to_ascii_uppercase() as char);
        idx += 3;
        start = idx;
    }
    f.extend(utf8_percent_encode(&path[start..], &AWS_URI_ENCODE_SET));
    f
}

/// Encode every pair with AWS UriEncode and sort them by key, then by value.
///
/// A pair without value is rendered as `key=`.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs = query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect::<Vec<_>>();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sorted_header_names(headers: &HeaderMap) -> Vec<&str> {
    // `keys` yields every name once even if it carries several values.
    let mut names = headers.keys().map(|k| k.as_str()).collect::<Vec<_>>();
    names.sort_unstable();
    names
}

fn canonical_header_value(headers: &HeaderMap, name: &str) -> Result<String> {
    let mut values = Vec::new();
    for value in headers.get_all(name) {
        let mut value = value.clone();
        SigningRequest::header_value_normalize(&mut value);
        values.push(value.to_str()?.to_string());
    }
    Ok(values.join(","))
}

/// Pick the headers that will be signed out of the request headers.
///
/// `extra` holds lower-case header names the caller wants signed on top of
/// the default set.
pub(crate) fn select_signed_headers(headers: &HeaderMap, extra: &[String]) -> HeaderMap {
    let mut signed = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name_str = name.as_str();
        if !is_signable_header(name_str) {
            continue;
        }
        if is_signed_header(name_str) || extra.iter().any(|v| v == name_str) {
            signed.append(name.clone(), value.clone());
        }
    }
    signed
}
