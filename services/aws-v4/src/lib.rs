//! AWS SigV4 signing for relaysign.
//!
//! This crate provides the [`RequestSigner`] that injects SigV4 headers into an
//! outbound request, plus the credential providers used to feed it.
//!
//! ## Example
//!
//! ```no_run
//! use relaysign_aws_v4::{DefaultCredentialProvider, RequestSigner};
//! use relaysign_core::{Context, OsEnv, Signer, SigningBody};
//!
//! # async fn example() -> relaysign_core::Result<()> {
//! let ctx = Context::new().with_env(OsEnv);
//! let signer = Signer::new(
//!     ctx,
//!     DefaultCredentialProvider::new(),
//!     RequestSigner::new("execute-api", "eu-central-1"),
//! );
//!
//! let (mut parts, body) = http::Request::get("https://api.example.com/items?limit=10")
//!     .body(Vec::new())
//!     .map_err(relaysign_core::Error::from)?
//!     .into_parts();
//! signer.sign(&mut parts, SigningBody::from(body.as_slice())).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod constants;
pub use constants::*;

mod credential;
pub use credential::Credential;

pub mod canonical_request;
pub mod signature;

mod sign_request;
pub use sign_request::RequestSigner;

mod provide_credential;
pub use provide_credential::*;
