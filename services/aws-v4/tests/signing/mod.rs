mod special_chars;
mod standard;

use http::request::Parts;
use http::HeaderMap;
use relaysign_aws_v4::{canonical_request, signature, Credential, RequestSigner};
use relaysign_core::{Context, SignRequest, SigningBody, SigningRequest};

pub const ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
pub const SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn static_credential() -> Credential {
    Credential {
        access_key_id: ACCESS_KEY_ID.to_string(),
        secret_access_key: SECRET_ACCESS_KEY.to_string(),
        session_token: None,
        expires_in: None,
    }
}

pub fn parts(method: http::Method, uri: &str) -> Parts {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .expect("request must be valid")
        .into_parts()
        .0
}

/// Sign `req` with a fixed clock in `us-east-1` for `service`.
pub async fn sign(req: &mut Parts, body: &[u8]) -> anyhow::Result<()> {
    let signer = RequestSigner::new("service", "us-east-1").with_time(
        relaysign_core::time::parse_iso8601("20150830T123600Z")?,
    );
    signer
        .sign_request(
            &Context::new(),
            req,
            SigningBody::from(body),
            Some(&static_credential()),
        )
        .await?;
    Ok(())
}

/// Rebuild the canonical request of a signed request out of its own headers.
pub fn canonical_request_of(req: &Parts) -> anyhow::Result<String> {
    let auth = req.headers[http::header::AUTHORIZATION].to_str()?;
    let signed = auth
        .split(", ")
        .find_map(|v| v.strip_prefix("SignedHeaders="))
        .ok_or_else(|| anyhow::anyhow!("authorization has no signed headers"))?;

    let mut headers = HeaderMap::new();
    for name in signed.split(';') {
        for value in req.headers.get_all(name) {
            headers.append(http::HeaderName::from_bytes(name.as_bytes())?, value.clone());
        }
    }

    let query = SigningRequest::query_parse(req.uri.query().unwrap_or_default());
    let payload_hash = req.headers["x-amz-content-sha256"].to_str()?;
    Ok(canonical_request::build(
        &req.method,
        req.uri.path(),
        &query,
        &headers,
        payload_hash,
    )?)
}

/// Compute the expected signature of a signed request from scratch.
pub fn expected_signature(req: &Parts) -> anyhow::Result<String> {
    let creq = canonical_request_of(req)?;
    let scope = signature::scope("20150830", "us-east-1", "service");
    let sts = signature::string_to_sign("20150830T123600Z", &scope, &creq);
    Ok(signature::sign(
        SECRET_ACCESS_KEY,
        "20150830",
        "us-east-1",
        "service",
        &sts,
    ))
}
