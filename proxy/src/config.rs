use std::fmt::{self, Debug, Display};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use http::Uri;
use log::debug;
use relaysign_core::utils::Redact;
use relaysign_core::Context;
use serde::Deserialize;

use crate::ProxyError;

/// Env holding the path of an optional TOML config file.
pub const RELAYSIGN_CONFIG: &str = "RELAYSIGN_CONFIG";
const RELAYSIGN_LISTEN: &str = "RELAYSIGN_LISTEN";
const RELAYSIGN_API_ENDPOINT: &str = "RELAYSIGN_API_ENDPOINT";
const RELAYSIGN_REGION: &str = "RELAYSIGN_REGION";
const RELAYSIGN_SERVICE: &str = "RELAYSIGN_SERVICE";
const RELAYSIGN_ACCESS_KEY_ID: &str = "RELAYSIGN_ACCESS_KEY_ID";
const RELAYSIGN_SECRET_ACCESS_KEY: &str = "RELAYSIGN_SECRET_ACCESS_KEY";
const RELAYSIGN_SESSION_TOKEN: &str = "RELAYSIGN_SESSION_TOKEN";
const RELAYSIGN_ROUTE_PREFIX: &str = "RELAYSIGN_ROUTE_PREFIX";
const RELAYSIGN_TIMEOUT_SECS: &str = "RELAYSIGN_TIMEOUT_SECS";
const RELAYSIGN_MAX_BODY_SIZE: &str = "RELAYSIGN_MAX_BODY_SIZE";
const RELAYSIGN_ADD_FORWARDED_HEADERS: &str = "RELAYSIGN_ADD_FORWARDED_HEADERS";
const RELAYSIGN_EXPOSE_ERRORS: &str = "RELAYSIGN_EXPOSE_ERRORS";
const AWS_REGION: &str = "AWS_REGION";

/// Config for the proxy.
///
/// Values are resolved in this order, later ones win:
///
/// 1. built-in defaults (`AWS_REGION` stands in for the default region)
/// 2. the TOML file named by `RELAYSIGN_CONFIG`
/// 3. `RELAYSIGN_*` environment variables
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the proxy listens on.
    pub listen: SocketAddr,
    /// Base URL every request is forwarded to, like `https://api.example.com/prod`.
    pub api_endpoint: String,
    /// Region used in the credential scope.
    pub region: String,
    /// Service name used in the credential scope.
    pub service: String,
    /// Static access key id. Falls back to `AWS_ACCESS_KEY_ID` when unset.
    pub access_key_id: Option<String>,
    /// Static secret access key. Falls back to `AWS_SECRET_ACCESS_KEY` when unset.
    pub secret_access_key: Option<String>,
    /// Optional session token for temporary credentials.
    pub session_token: Option<String>,
    /// First path segment(s) the proxy answers on, without slashes.
    pub route_prefix: String,
    /// Timeout of a single upstream call in seconds.
    pub timeout_secs: u64,
    /// Largest inbound body accepted, in bytes.
    pub max_body_size: usize,
    /// Whether to add `X-Forwarded-For`, `X-Forwarded-Host` and `X-Forwarded-Proto`.
    pub add_forwarded_headers: bool,
    /// Whether error responses carry the error message. Meant for development only.
    pub expose_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            api_endpoint: String::new(),
            region: "eu-central-1".to_string(),
            service: "execute-api".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            route_prefix: "system_api".to_string(),
            timeout_secs: 30,
            max_body_size: 10 * 1024 * 1024,
            add_forwarded_headers: false,
            expose_errors: false,
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen", &self.listen)
            .field("api_endpoint", &self.api_endpoint)
            .field("region", &self.region)
            .field("service", &self.service)
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("route_prefix", &self.route_prefix)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_body_size", &self.max_body_size)
            .field("add_forwarded_headers", &self.add_forwarded_headers)
            .field("expose_errors", &self.expose_errors)
            .finish()
    }
}

impl Config {
    /// Load config from defaults, the optional config file and env, then validate it.
    pub fn load(ctx: &Context) -> Result<Self, ProxyError> {
        let mut cfg = match ctx.env_var(RELAYSIGN_CONFIG) {
            Some(path) => {
                debug!("loading config from {path}");
                Self::from_file(path, ctx)?
            }
            None => Self::from_toml("", ctx)?,
        };
        cfg.apply_env(ctx)?;

        let cfg = cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>, ctx: &Context) -> Result<Self, ProxyError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            ProxyError::Configuration(format!(
                "failed to read config file {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml(&content, ctx)
    }

    /// Parse config from TOML content.
    ///
    /// `AWS_REGION` from `ctx` is only used when the content doesn't set a region.
    pub fn from_toml(content: &str, ctx: &Context) -> Result<Self, ProxyError> {
        let table = content
            .parse::<toml::Table>()
            .map_err(|err| ProxyError::Configuration(format!("invalid config file: {err}")))?;
        let has_region = table.contains_key("region");

        let mut cfg: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|err| ProxyError::Configuration(format!("invalid config file: {err}")))?;
        if !has_region {
            if let Some(region) = ctx.env_var(AWS_REGION).filter(|v| !v.is_empty()) {
                cfg.region = region;
            }
        }
        Ok(cfg)
    }

    fn apply_env(&mut self, ctx: &Context) -> Result<(), ProxyError> {
        if let Some(v) = ctx.env_var(RELAYSIGN_LISTEN) {
            self.listen = parse_env(RELAYSIGN_LISTEN, &v)?;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_API_ENDPOINT) {
            self.api_endpoint = v;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_REGION) {
            self.region = v;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_SERVICE) {
            self.service = v;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_ACCESS_KEY_ID) {
            self.access_key_id = Some(v);
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_SECRET_ACCESS_KEY) {
            self.secret_access_key = Some(v);
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_SESSION_TOKEN) {
            self.session_token = Some(v);
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_ROUTE_PREFIX) {
            self.route_prefix = v;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_TIMEOUT_SECS) {
            self.timeout_secs = parse_env(RELAYSIGN_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_MAX_BODY_SIZE) {
            self.max_body_size = parse_env(RELAYSIGN_MAX_BODY_SIZE, &v)?;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_ADD_FORWARDED_HEADERS) {
            self.add_forwarded_headers = parse_bool(RELAYSIGN_ADD_FORWARDED_HEADERS, &v)?;
        }
        if let Some(v) = ctx.env_var(RELAYSIGN_EXPOSE_ERRORS) {
            self.expose_errors = parse_bool(RELAYSIGN_EXPOSE_ERRORS, &v)?;
        }
        Ok(())
    }

    /// Drop trailing slashes from the endpoint and surrounding slashes from the
    /// prefix, and turn empty credential values into `None`.
    pub fn normalize(mut self) -> Self {
        self.api_endpoint = self.api_endpoint.trim().trim_end_matches('/').to_string();
        self.route_prefix = self.route_prefix.trim_matches('/').to_string();
        for v in [
            &mut self.access_key_id,
            &mut self.secret_access_key,
            &mut self.session_token,
        ] {
            if v.as_deref().is_some_and(str::is_empty) {
                *v = None;
            }
        }
        self
    }

    /// Check that the config can serve requests.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.api_endpoint.is_empty() {
            return Err(ProxyError::Configuration(
                "api_endpoint is required".to_string(),
            ));
        }
        let uri = self.api_endpoint.parse::<Uri>().map_err(|err| {
            ProxyError::Configuration(format!(
                "api_endpoint {} is not a valid url: {err}",
                self.api_endpoint
            ))
        })?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            _ => {
                return Err(ProxyError::Configuration(format!(
                    "api_endpoint {} must be an absolute http(s) url",
                    self.api_endpoint
                )))
            }
        }
        if uri.authority().is_none() || uri.query().is_some() {
            return Err(ProxyError::Configuration(format!(
                "api_endpoint {} must have a host and no query",
                self.api_endpoint
            )));
        }

        for (name, value) in [
            ("region", &self.region),
            ("service", &self.service),
            ("route_prefix", &self.route_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ProxyError::Configuration(format!("{name} must not be empty")));
            }
        }
        if self
            .route_prefix
            .chars()
            .any(|c| matches!(c, '{' | '}' | '*' | '?' | '#') || c.is_whitespace())
        {
            return Err(ProxyError::Configuration(format!(
                "route_prefix {} contains characters not allowed in a route",
                self.route_prefix
            )));
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ProxyError::Configuration(
                "access_key_id and secret_access_key must be set together".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ProxyError::Configuration(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_body_size == 0 {
            return Err(ProxyError::Configuration(
                "max_body_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Timeout of a single upstream call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ProxyError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| ProxyError::Configuration(format!("invalid {key} {value:?}: {err}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ProxyError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProxyError::Configuration(format!(
            "invalid {key} {value:?}: expect a boolean"
        ))),
    }
}
