//! A reverse proxy that re-signs every relayed request with AWS SigV4.
//!
//! Requests received under `/{route_prefix}/` are forwarded to the configured
//! endpoint with the prefix removed:
//!
//! ```text
//! GET /system_api/items?limit=10  ->  GET https://api.example.com/items?limit=10
//! ```
//!
//! Before sending, the outbound request gets `host`, `x-amz-date`,
//! `x-amz-content-sha256` and `authorization` headers computed from the
//! configured credential. The upstream response is streamed back as is.

mod config;
pub use config::{Config, RELAYSIGN_CONFIG};

mod error;
pub use error::ProxyError;

mod forward;
pub use forward::{target_url, Forwarder};

mod server;
pub use server::{router, serve};
