use crate::canonical_request::{self, select_signed_headers, signed_headers};
use crate::constants::{
    ALGORITHM, EMPTY_STRING_SHA256, X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::signature;
use crate::Credential;
use async_trait::async_trait;
use http::request::Parts;
use http::{header, HeaderMap, HeaderValue, Method};
use log::debug;
use relaysign_core::hash::hex_sha256;
use relaysign_core::time::{format_date, format_iso8601, now, parse_iso8601, DateTime};
use relaysign_core::{Context, Error, Result, SignRequest, SigningBody, SigningRequest};

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
///
/// Signing injects `host`, `x-amz-content-sha256`, `x-amz-date`, the optional
/// `x-amz-security-token` and finally `authorization`. The URI and body are left
/// untouched.
#[derive(Debug)]
pub struct RequestSigner {
    service: String,
    region: String,
    signed_headers: Vec<String>,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for the given service and region.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            signed_headers: Vec::new(),

            time: None,
        }
    }

    /// Sign this header on top of the default set.
    ///
    /// Transport managed headers like `content-length` or `user-agent` are
    /// never signed, registering them has no effect.
    pub fn with_signed_header(mut self, name: &str) -> Self {
        self.signed_headers.push(name.to_ascii_lowercase());
        self
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Check that the `authorization` header of a signed request still matches
    /// its method, URI, signed headers and body.
    ///
    /// Returns `Ok(false)` when anything covered by the signature changed since
    /// signing, and an error when the request carries no parsable signature.
    pub fn verify(&self, req: &Parts, body: SigningBody<'_>, cred: &Credential) -> Result<bool> {
        let auth = req
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| Error::request_invalid("request is not signed"))?
            .to_str()?;
        let signed = auth
            .split(", ")
            .find_map(|v| v.strip_prefix("SignedHeaders="))
            .ok_or_else(|| Error::request_invalid("authorization without SignedHeaders"))?;
        let date = req
            .headers
            .get(X_AMZ_DATE)
            .ok_or_else(|| Error::request_invalid("request without x-amz-date"))?
            .to_str()?;
        let time = parse_iso8601(date)?;

        let mut headers = HeaderMap::new();
        for name in signed.split(';') {
            for value in req.headers.get_all(name) {
                headers.append(header::HeaderName::from_bytes(name.as_bytes())?, value.clone());
            }
        }

        let query = req
            .uri
            .query()
            .map(SigningRequest::query_parse)
            .unwrap_or_default();
        let expected = self.authorization(
            &req.method,
            req.uri.path(),
            &query,
            &headers,
            &payload_hash(body)?,
            cred,
            time,
        )?;

        Ok(expected == auth)
    }

    #[allow(clippy::too_many_arguments)]
    fn authorization(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
        payload_hash: &str,
        cred: &Credential,
        now: DateTime,
    ) -> Result<String> {
        let creq = canonical_request::build(method, path, query, headers, payload_hash)?;
        debug!("calculated canonical request: {creq}");

        // Scope: "20220313/<region>/<service>/aws4_request"
        let date = format_date(now);
        let scope = signature::scope(&date, &self.region, &self.service);
        debug!("calculated scope: {scope}");

        let string_to_sign = signature::string_to_sign(&format_iso8601(now), &scope, &creq);
        debug!("calculated string to sign: {string_to_sign}");

        let signature = signature::sign(
            &cred.secret_access_key,
            &date,
            &self.region,
            &self.service,
            &string_to_sign,
        );

        Ok(format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id,
            scope,
            signed_headers(headers),
            signature
        ))
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        body: SigningBody<'_>,
        credential: Option<&Self::Credential>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Err(Error::config_invalid(
                "aws v4 signing requires a credential",
            ));
        };
        let payload_hash = payload_hash(body)?;
        let now = self.time.unwrap_or_else(now);

        let mut signed_req = SigningRequest::build(req)?;
        canonicalize_header(&mut signed_req, cred, &payload_hash, now)?;

        let headers = select_signed_headers(&signed_req.headers, &self.signed_headers);
        let authorization = self.authorization(
            &signed_req.method,
            &signed_req.path,
            &signed_req.query,
            &headers,
            &payload_hash,
            cred,
            now,
        )?;

        let mut authorization = HeaderValue::from_str(&authorization)?;
        authorization.set_sensitive(true);
        signed_req
            .headers
            .insert(header::AUTHORIZATION, authorization);

        // Apply to the request.
        signed_req.apply(req)
    }
}

fn payload_hash(body: SigningBody<'_>) -> Result<String> {
    match body.as_bytes() {
        Some([]) => Ok(EMPTY_STRING_SHA256.to_string()),
        Some(bs) => Ok(hex_sha256(bs)),
        None => Err(Error::request_invalid(
            "streaming body can't be signed, the payload hash needs the whole body",
        )),
    }
}

fn canonicalize_header(
    ctx: &mut SigningRequest,
    cred: &Credential,
    payload_hash: &str,
    now: DateTime,
) -> Result<()> {
    // Host always reflects the target, whatever the caller sent.
    ctx.headers
        .insert(header::HOST, HeaderValue::from_str(ctx.authority.as_str())?);

    ctx.headers.insert(
        X_AMZ_CONTENT_SHA_256,
        HeaderValue::from_str(payload_hash)?,
    );
    ctx.headers
        .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

    match &cred.session_token {
        Some(token) => {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to valid leaking.
            value.set_sensitive(true);
            ctx.headers.insert(X_AMZ_SECURITY_TOKEN, value);
        }
        // A token we did not issue must not ride along.
        None => {
            ctx.headers.remove(X_AMZ_SECURITY_TOKEN);
        }
    }

    Ok(())
}
