use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use relaysign_core::ErrorKind;
use thiserror::Error;

/// Everything that can go wrong while relaying a request.
///
/// Each variant maps to exactly one response status, see [`ProxyError::status`].
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or invalid credentials, endpoint or route.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The outbound request could not be signed.
    #[error("failed to sign request: {0}")]
    Signing(#[source] relaysign_core::Error),
    /// The inbound body is larger than allowed.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The configured limit.
        limit: usize,
    },
    /// The inbound request could not be read or mapped to a target.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The upstream could not be reached.
    #[error("upstream unreachable: {0}")]
    Gateway(#[source] reqwest::Error),
    /// The upstream didn't answer in time.
    #[error("upstream timed out: {0}")]
    GatewayTimeout(#[source] reqwest::Error),
    /// The upstream answered with something we can't relay.
    #[error("invalid upstream response: {0}")]
    Protocol(String),
}

impl ProxyError {
    /// Status code returned to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Configuration(_) | ProxyError::Signing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Gateway(_) | ProxyError::Protocol(_) => StatusCode::BAD_GATEWAY,
            ProxyError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Build the client facing response.
    ///
    /// The body only carries the status reason unless `expose` is set, in which
    /// case the full error message is included.
    pub fn to_response(&self, expose: bool) -> Response {
        let status = self.status();
        let body = if expose {
            self.to_string()
        } else {
            status
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string()
        };

        let mut resp = Response::new(Body::from(body));
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        resp
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}

impl From<relaysign_core::Error> for ProxyError {
    fn from(err: relaysign_core::Error) -> Self {
        match err.kind() {
            ErrorKind::ConfigInvalid
            | ErrorKind::CredentialInvalid
            | ErrorKind::CredentialExpired => ProxyError::Configuration(err.to_string()),
            ErrorKind::RequestInvalid | ErrorKind::Unexpected => ProxyError::Signing(err),
        }
    }
}

/// Classify by cause, checked in order: timeouts first, then body and decode
/// failures, then connect and request failures.
///
/// A malformed upstream response head is reported by hyper as a request
/// error, so it lands in `Gateway` rather than `Protocol`. Both answer 502.
impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::GatewayTimeout(err)
        } else if err.is_body() || err.is_decode() {
            ProxyError::Protocol(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ProxyError::Gateway(err)
        } else {
            ProxyError::Protocol(err.to_string())
        }
    }
}
