//! Environment configuration for the example client.

use anyhow::{Context, Result};
use rp_identity_oidc::RelyingPartyConfig;
use std::str::FromStr;
use url::Url;

const DEFAULT_AUTH_HOST: &str = "https://auth.eks.codebrick.io";
const DEFAULT_TOKEN_ISSUER: &str = "https://accounts.eks.codebrick.io";

/// Configuration for the example client
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub auth_host: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Expected `iss` of identity tokens. Configured separately from `auth_host`.
    pub token_issuer: String,
    pub state_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = parse_var(&lookup, "PORT", 8080u16)?;

        let auth_host = var("AUTH_HOST", DEFAULT_AUTH_HOST);
        Url::parse(&auth_host)
            .with_context(|| format!("AUTH_HOST is not a valid URL: {}", auth_host))?;

        let redirect_uri = var(
            "REDIRECT_URI",
            &format!("http://localhost:{}/oauth_callback", port),
        );
        Url::parse(&redirect_uri)
            .with_context(|| format!("REDIRECT_URI is not a valid URL: {}", redirect_uri))?;

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port,
            auth_host,
            client_id: var("CLIENT_ID", "client-1"),
            client_secret: var("CLIENT_SECRET", "client-1-secret"),
            redirect_uri,
            token_issuer: var("TOKEN_ISSUER", DEFAULT_TOKEN_ISSUER),
            state_ttl_seconds: parse_var(&lookup, "STATE_TTL_SECONDS", 600)?,
            http_timeout_seconds: parse_var(&lookup, "HTTP_TIMEOUT_SECONDS", 10)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn relying_party_config(&self) -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            self.auth_host.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
            self.token_issuer.clone(),
        )
        .with_state_ttl(self.state_ttl_seconds)
        .with_http_timeout(self.http_timeout_seconds)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, value)),
        None => Ok(default),
    }
}
