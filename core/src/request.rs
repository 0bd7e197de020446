use std::mem;

use http::uri::Authority;
use http::uri::Scheme;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use percent_encoding::percent_decode_str;

use crate::{Error, Result};

/// Signing context for request.
///
/// Only the headers are taken out of the request while signing. The URI is
/// read but never rebuilt, so the request keeps the exact path and query
/// string it was built with.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path, as it appears on the wire.
    pub path: String,
    /// HTTP query parameters, percent decoded, in wire order.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = &parts.uri;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| Error::request_invalid("request without authority is invalid for signing"))?;

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme().cloned().unwrap_or(Scheme::HTTP),
            authority,
            path: uri.path().to_string(),
            query: uri.query().map(Self::query_parse).unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        // Return headers back.
        mem::swap(&mut parts.headers, &mut self.headers);
        Ok(())
    }

    /// Parse a raw query string into percent decoded pairs.
    ///
    /// `+` is kept as is: only `%XX` escapes are decoded. A pair without `=`
    /// gets an empty value. Empty segments (`a&&b`) are skipped.
    pub fn query_parse(query: &str) -> Vec<(String, String)> {
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (
                    percent_decode_str(k).decode_utf8_lossy().into_owned(),
                    percent_decode_str(v).decode_utf8_lossy().into_owned(),
                )
            })
            .collect()
    }

    /// Normalize header value.
    ///
    /// Leading and trailing whitespace is removed and inner runs of spaces are
    /// collapsed into a single space.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bs = v.as_bytes();
        let trimmed = bs.trim_ascii();
        if trimmed.len() == bs.len() && !trimmed.windows(2).any(|w| w == b"  ") {
            return;
        }

        let mut normalized = Vec::with_capacity(trimmed.len());
        for b in trimmed {
            if *b == b' ' && normalized.last() == Some(&b' ') {
                continue;
            }
            normalized.push(*b);
        }

        let sensitive = v.is_sensitive();
        // This can't fail because we started with a valid HeaderValue and then only removed spaces
        *v = HeaderValue::from_bytes(&normalized).expect("invalid header value");
        v.set_sensitive(sensitive);
    }
}

/// SigningBody is the payload handed to the signer alongside the request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningBody<'a> {
    /// No body at all.
    Empty,
    /// A fully materialized body.
    Bytes(&'a [u8]),
    /// A body that can only be read once and can't be hashed up front.
    Streaming,
}

impl<'a> SigningBody<'a> {
    /// Returns the body bytes, or `None` for a streaming body.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            SigningBody::Empty => Some(&[]),
            SigningBody::Bytes(bs) => Some(bs),
            SigningBody::Streaming => None,
        }
    }
}

impl<'a> From<&'a [u8]> for SigningBody<'a> {
    fn from(bs: &'a [u8]) -> Self {
        if bs.is_empty() {
            SigningBody::Empty
        } else {
            SigningBody::Bytes(bs)
        }
    }
}
