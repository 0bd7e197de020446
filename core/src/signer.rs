use crate::{Context, Error, ProvideCredential, Result, SignRequest, SigningBody, SigningCredential};
use log::debug;
use std::sync::Arc;

/// Signer is the main struct used to sign the request.
///
/// It couples a credential provider with a request signer. The credential is
/// loaded on every call and nothing is cached, so a `Signer` holds no mutable
/// state and can be shared freely between concurrent requests.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = K>>,
    builder: Arc<dyn SignRequest<Credential = K>>,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer.
    pub fn new(
        ctx: Context,
        loader: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K>,
    ) -> Self {
        Self {
            ctx,

            loader: Arc::new(loader),
            builder: Arc::new(builder),
        }
    }

    /// Signing request.
    ///
    /// This must be the last step before the request is sent: any header or body
    /// change after signing silently invalidates the signature.
    pub async fn sign(&self, req: &mut http::request::Parts, body: SigningBody<'_>) -> Result<()> {
        let credential = self.loader.provide_credential(&self.ctx).await?;
        let Some(credential) = credential else {
            return Err(Error::config_invalid(
                "no credential available for signing",
            ));
        };
        if !credential.is_valid() {
            return Err(Error::credential_invalid(
                "credential is incomplete or expired",
            ));
        }
        debug!("signing {} {} with {:?}", req.method, req.uri, credential);

        self.builder
            .sign_request(&self.ctx, req, body, Some(&credential))
            .await
    }
}
