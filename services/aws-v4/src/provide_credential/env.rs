use crate::{constants::*, Credential};
use async_trait::async_trait;
use relaysign_core::time::parse_rfc3339;
use relaysign_core::{Context, Error, ProvideCredential, Result};

/// EnvCredentialProvider loads AWS credentials from environment variables.
///
/// This provider looks for the following environment variables:
/// - `AWS_ACCESS_KEY_ID`: The AWS access key ID
/// - `AWS_SECRET_ACCESS_KEY`: The AWS secret access key
/// - `AWS_SESSION_TOKEN`: The AWS session token (optional)
/// - `AWS_CREDENTIAL_EXPIRATION`: RFC3339 expiration of temporary credentials (optional)
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let access_key_id = ctx.env_var(AWS_ACCESS_KEY_ID).filter(|v| !v.is_empty());
        let secret_access_key = ctx.env_var(AWS_SECRET_ACCESS_KEY).filter(|v| !v.is_empty());

        let (Some(ak), Some(sk)) = (access_key_id, secret_access_key) else {
            return Ok(None);
        };

        let expires_in = match ctx
            .env_var(AWS_CREDENTIAL_EXPIRATION)
            .filter(|v| !v.is_empty())
        {
            Some(v) => Some(parse_rfc3339(&v).map_err(|e| {
                Error::config_invalid(format!("invalid {AWS_CREDENTIAL_EXPIRATION}: {v}"))
                    .with_source(e)
            })?),
            None => None,
        };

        Ok(Some(Credential {
            access_key_id: ak,
            secret_access_key: sk,
            session_token: ctx.env_var(AWS_SESSION_TOKEN).filter(|v| !v.is_empty()),
            expires_in,
        }))
    }
}
