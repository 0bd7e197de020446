use super::*;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{HeaderValue, Method};
use pretty_assertions::assert_eq;
use relaysign_aws_v4::{
    DefaultCredentialProvider, StaticCredentialProvider, AWS_ACCESS_KEY_ID,
    AWS_SECRET_ACCESS_KEY, EMPTY_STRING_SHA256,
};
use relaysign_core::time::{now, DateTime};
use relaysign_core::{
    ErrorKind, ProvideCredential, Result, Signer, SigningBody, StaticEnv,
};
use std::collections::HashMap;

#[tokio::test]
async fn test_get_with_query() -> anyhow::Result<()> {
    init_logger();

    let mut req = parts(Method::GET, "https://example.amazonaws.com/items?limit=10");
    sign(&mut req, b"").await?;

    assert_eq!(
        canonical_request_of(&req)?,
        [
            "GET",
            "/items",
            "limit=10",
            "host:example.amazonaws.com",
            &format!("x-amz-content-sha256:{EMPTY_STRING_SHA256}"),
            "x-amz-date:20150830T123600Z",
            "",
            "host;x-amz-content-sha256;x-amz-date",
            EMPTY_STRING_SHA256,
        ]
        .join("\n")
    );

    let auth = req.headers[AUTHORIZATION].to_str()?;
    assert_eq!(
        auth,
        format!(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature={}",
            expected_signature(&req)?
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_post_json() -> anyhow::Result<()> {
    init_logger();

    let body = br#"{"name":"widget"}"#;
    let mut req = parts(Method::POST, "https://example.amazonaws.com/prod/items");
    req.headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    req.headers
        .insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
    req.headers
        .insert(http::header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
    sign(&mut req, body).await?;

    let auth = req.headers[AUTHORIZATION].to_str()?;
    assert!(auth.contains("SignedHeaders=content-type;host;x-amz-content-sha256;x-amz-date,"));
    assert!(auth.ends_with(&expected_signature(&req)?));

    // Unsigned headers are still forwarded.
    assert_eq!(req.headers[http::header::ACCEPT], "application/json");
    assert_eq!(req.headers[http::header::USER_AGENT], "curl/8.0");
    Ok(())
}

#[tokio::test]
async fn test_client_host_is_replaced() -> anyhow::Result<()> {
    let mut req = parts(Method::GET, "http://127.0.0.1:9000/items");
    req.headers
        .insert(HOST, HeaderValue::from_static("localhost:8080"));
    sign(&mut req, b"").await?;

    assert_eq!(req.headers[HOST], "127.0.0.1:9000");
    assert!(canonical_request_of(&req)?.contains("\nhost:127.0.0.1:9000\n"));
    Ok(())
}

#[tokio::test]
async fn test_signing_is_deterministic() -> anyhow::Result<()> {
    let mut first = parts(Method::PUT, "https://example.amazonaws.com/hello?b=2&a=1");
    let mut second = parts(Method::PUT, "https://example.amazonaws.com/hello?a=1&b=2");
    sign(&mut first, b"Hello,World!").await?;
    sign(&mut second, b"Hello,World!").await?;

    assert_eq!(first.headers[AUTHORIZATION], second.headers[AUTHORIZATION]);
    Ok(())
}

#[tokio::test]
async fn test_signer_with_static_credential() -> anyhow::Result<()> {
    init_logger();

    let signer = Signer::new(
        Context::new(),
        StaticCredentialProvider::new(ACCESS_KEY_ID, SECRET_ACCESS_KEY),
        RequestSigner::new("execute-api", "eu-central-1"),
    );

    let mut req = parts(Method::GET, "https://api.example.com/items");
    signer.sign(&mut req, SigningBody::Empty).await?;

    let verifier = RequestSigner::new("execute-api", "eu-central-1");
    assert!(verifier.verify(&req, SigningBody::Empty, &static_credential())?);
    Ok(())
}

#[tokio::test]
async fn test_signer_with_env_credential() -> anyhow::Result<()> {
    let ctx = Context::new().with_env(StaticEnv {
        envs: HashMap::from_iter([
            (AWS_ACCESS_KEY_ID.to_string(), ACCESS_KEY_ID.to_string()),
            (
                AWS_SECRET_ACCESS_KEY.to_string(),
                SECRET_ACCESS_KEY.to_string(),
            ),
        ]),
    });
    let signer = Signer::new(
        ctx,
        DefaultCredentialProvider::new(),
        RequestSigner::new("execute-api", "eu-central-1"),
    );

    let mut req = parts(Method::DELETE, "https://api.example.com/items/42");
    signer.sign(&mut req, SigningBody::Empty).await?;

    assert!(req.headers[AUTHORIZATION]
        .to_str()?
        .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    Ok(())
}

#[tokio::test]
async fn test_signer_without_credential() {
    let signer = Signer::new(
        Context::new(),
        DefaultCredentialProvider::new(),
        RequestSigner::new("execute-api", "eu-central-1"),
    );

    let mut req = parts(Method::GET, "https://api.example.com/items");
    let err = signer
        .sign(&mut req, SigningBody::Empty)
        .await
        .expect_err("must fail without credential");
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert!(req.headers.get(AUTHORIZATION).is_none());
}

#[derive(Debug)]
struct ExpiredCredentialProvider(DateTime);

#[async_trait::async_trait]
impl ProvideCredential for ExpiredCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(Some(Credential {
            expires_in: Some(self.0),
            ..static_credential()
        }))
    }
}

#[tokio::test]
async fn test_signer_with_expired_credential() {
    let signer = Signer::new(
        Context::new(),
        ExpiredCredentialProvider(now() - chrono::TimeDelta::try_minutes(1).expect("in bounds")),
        RequestSigner::new("execute-api", "eu-central-1"),
    );

    let mut req = parts(Method::GET, "https://api.example.com/items");
    let err = signer
        .sign(&mut req, SigningBody::Empty)
        .await
        .expect_err("must fail with expired credential");
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
}
