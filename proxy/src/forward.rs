//! Relay an inbound request to the upstream and its response back.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::response::Response;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::request::Parts;
use http::{Request, Uri};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use log::{debug, info};
use relaysign_aws_v4::{
    Credential, DefaultCredentialProvider, ProvideCredentialChain, RequestSigner,
    StaticCredentialProvider,
};
use relaysign_core::{Context, Signer, SigningBody};

use crate::{Config, ProxyError};

/// Headers that only make sense for a single connection.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Build the upstream URL for an inbound request.
///
/// `rest` is appended verbatim so the percent-encoding chosen by the client
/// survives the hop.
pub fn target_url(base: &str, rest: &str, query: Option<&str>) -> String {
    match query {
        Some(query) => format!("{base}/{rest}?{query}"),
        None => format!("{base}/{rest}"),
    }
}

/// Forwarder relays requests received under the route prefix to the configured
/// endpoint and signs every outbound request with SigV4.
#[derive(Debug)]
pub struct Forwarder {
    endpoint: String,
    prefix: String,
    max_body_size: usize,
    add_forwarded_headers: bool,
    expose_errors: bool,

    client: reqwest::Client,
    signer: Signer<Credential>,
}

impl Forwarder {
    /// Create a forwarder from a validated config.
    ///
    /// Static keys from the config are tried first, then the `AWS_*` env of `ctx`.
    pub fn new(config: &Config, ctx: Context) -> Result<Self, ProxyError> {
        let mut chain = ProvideCredentialChain::new();
        if let (Some(ak), Some(sk)) = (&config.access_key_id, &config.secret_access_key) {
            let mut provider = StaticCredentialProvider::new(ak, sk);
            if let Some(token) = &config.session_token {
                provider = provider.with_session_token(token);
            }
            chain = chain.push(provider);
        }
        chain = chain.push(DefaultCredentialProvider::new());

        let signer = Signer::new(
            ctx,
            chain,
            RequestSigner::new(&config.service, &config.region),
        );
        Self::with_signer(config, signer)
    }

    /// Create a forwarder that signs with the given signer.
    pub fn with_signer(config: &Config, signer: Signer<Credential>) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| {
                ProxyError::Configuration(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            endpoint: config.api_endpoint.clone(),
            prefix: config.route_prefix.clone(),
            max_body_size: config.max_body_size,
            add_forwarded_headers: config.add_forwarded_headers,
            expose_errors: config.expose_errors,

            client,
            signer,
        })
    }

    /// The route prefix without slashes.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether error responses carry the error message.
    pub fn expose_errors(&self) -> bool {
        self.expose_errors
    }

    /// Strip `/{prefix}` and the following slash from a raw inbound path.
    ///
    /// Paths outside the prefix are returned without their leading slash.
    pub fn rest<'a>(&self, path: &'a str) -> &'a str {
        let path = path.strip_prefix('/').unwrap_or(path);
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") => "",
            Some(rest) if rest.starts_with('/') => &rest[1..],
            _ => path,
        }
    }

    /// Relay `req` upstream and return the upstream response.
    pub async fn forward(&self, req: Request<Body>) -> Result<Response, ProxyError> {
        let outbound = self.prepare(req).await?;
        self.send(outbound).await
    }

    /// Build the signed outbound request for `req`.
    ///
    /// Nothing may touch the returned request before it's sent, or the
    /// signature no longer matches.
    pub async fn prepare(&self, req: Request<Body>) -> Result<Request<Bytes>, ProxyError> {
        let (parts, body) = req.into_parts();

        let rest = self.rest(parts.uri.path());
        if has_dot_segment(rest) {
            return Err(ProxyError::BadRequest(format!(
                "path must not contain dot segments: {}",
                parts.uri.path()
            )));
        }

        // Sign the URL exactly as the client will serialize it on the wire.
        let target = target_url(&self.endpoint, rest, parts.uri.query());
        let url = reqwest::Url::parse(&target)
            .map_err(|err| ProxyError::BadRequest(format!("invalid target url {target}: {err}")))?;
        let uri = url
            .as_str()
            .parse::<Uri>()
            .map_err(|err| ProxyError::BadRequest(format!("invalid target url {url}: {err}")))?;

        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(ProxyError::PayloadTooLarge {
                    limit: self.max_body_size,
                })
            }
            Err(err) => {
                return Err(ProxyError::BadRequest(format!(
                    "failed to read request body: {err}"
                )))
            }
        };

        let mut headers = forwardable_headers(&parts.headers);
        if self.add_forwarded_headers {
            append_forwarded_headers(&parts, &mut headers)?;
        }

        let (mut outbound, ()) = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(())
            .map_err(|err| ProxyError::BadRequest(err.to_string()))?
            .into_parts();
        outbound.headers = headers;

        self.signer
            .sign(&mut outbound, SigningBody::from(body.as_ref()))
            .await?;

        info!("forwarding {} {} to {url}", parts.method, parts.uri.path());
        Ok(Request::from_parts(outbound, body))
    }

    /// Send a prepared request and stream the upstream response back.
    pub async fn send(&self, req: Request<Bytes>) -> Result<Response, ProxyError> {
        let req = reqwest::Request::try_from(req)
            .map_err(|err| ProxyError::BadRequest(format!("invalid outbound request: {err}")))?;

        let resp = self.client.execute(req).await?;
        debug!("upstream responded {} for {}", resp.status(), resp.url());

        let resp: http::Response<reqwest::Body> = resp.into();
        let (mut parts, body) = resp.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Whether `rest` has a `.` or `..` segment, plain or percent-encoded.
///
/// URL parsing removes such segments, so the path sent would differ from the
/// path signed and `..` could climb out of the endpoint's base path.
fn has_dot_segment(rest: &str) -> bool {
    rest.split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

/// Remove hop-by-hop headers, including the ones listed in `connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|v| HeaderName::from_bytes(v.trim().as_bytes()).ok())
        .collect::<Vec<_>>();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    headers
}

fn append_forwarded_headers(inbound: &Parts, headers: &mut HeaderMap) -> Result<(), ProxyError> {
    if let Some(ConnectInfo(addr)) = inbound.extensions.get::<ConnectInfo<SocketAddr>>() {
        let ip = addr.ip().to_string();
        let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prev) => format!("{prev}, {ip}"),
            None => ip,
        };
        headers.insert(X_FORWARDED_FOR, HeaderValue::try_from(value).map_err(bad_header)?);
    }

    let host = inbound
        .headers
        .get(header::HOST)
        .cloned()
        .or_else(|| {
            inbound
                .uri
                .authority()
                .and_then(|v| HeaderValue::from_str(v.as_str()).ok())
        });
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST, host);
    }

    let proto = inbound.uri.scheme_str().unwrap_or("http");
    headers.insert(
        X_FORWARDED_PROTO,
        HeaderValue::from_str(proto).map_err(bad_header)?,
    );
    Ok(())
}

fn bad_header(err: http::header::InvalidHeaderValue) -> ProxyError {
    ProxyError::BadRequest(format!("invalid forwarded header: {err}"))
}
