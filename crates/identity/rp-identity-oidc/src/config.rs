//! Relying party configuration types.

use crate::error::{ConfigError, OidcResult};
use std::time::Duration;
use url::Url;

/// Upper bound on the lifetime of a pending state.
pub const MAX_STATE_TTL_SECONDS: u64 = 86400; // 24 hours

/// Configuration of a single relying party registered at one authorization server.
#[derive(Debug, Clone)]
pub struct RelyingPartyConfig {
    /// Base URL of the authorization server. Endpoints are derived from it.
    pub auth_host: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Expected `iss` claim. Not derived from `auth_host`.
    pub expected_issuer: String,
    pub state_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
    pub jwks: KeySetConfig,
}

impl RelyingPartyConfig {
    pub fn new(
        auth_host: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        expected_issuer: impl Into<String>,
    ) -> Self {
        Self {
            auth_host: auth_host.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec!["openid".to_string(), "profile".to_string()],
            expected_issuer: expected_issuer.into(),
            state_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 10,
            jwks: KeySetConfig::default(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_state_ttl(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn with_key_set(mut self, jwks: KeySetConfig) -> Self {
        self.jwks = jwks;
        self
    }

    /// Space separated scope string sent to the authorize endpoint.
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Checks required values and derives the authorization server endpoints.
    pub fn validate(&self) -> OidcResult<Endpoints> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("expected_issuer", &self.expected_issuer),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        if self.scopes.is_empty() {
            return Err(ConfigError::Invalid("at least one scope is required".to_string()));
        }

        if self.state_ttl_seconds == 0 || self.state_ttl_seconds > MAX_STATE_TTL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "state_ttl_seconds must be between 1 and {}, got {}",
                MAX_STATE_TTL_SECONDS, self.state_ttl_seconds
            )));
        }

        if self.http_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_seconds must be positive".to_string(),
            ));
        }

        Url::parse(&self.redirect_uri)?;
        Endpoints::from_auth_host(&self.auth_host)
    }
}

/// Endpoints of the authorization server, derived from its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorization: Url,
    pub token: Url,
    pub jwks: Url,
    pub signout: Url,
}

impl Endpoints {
    pub fn from_auth_host(auth_host: &str) -> OidcResult<Self> {
        let base = Url::parse(auth_host)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "auth host must be an http(s) URL, got {}",
                auth_host
            )));
        }

        let base = base.as_str().trim_end_matches('/');
        Ok(Self {
            authorization: Url::parse(&format!("{}/auth", base))?,
            token: Url::parse(&format!("{}/oauth/token", base))?,
            jwks: Url::parse(&format!("{}/.well-known/jwks.json", base))?,
            signout: Url::parse(&format!("{}/signout", base))?,
        })
    }
}

/// Caching behaviour of the remote key set.
#[derive(Debug, Clone)]
pub struct KeySetConfig {
    /// TTL when the response carries no `Cache-Control: max-age`.
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    pub min_ttl: Duration,
    pub max_response_size: usize,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600), // 1 hour
            max_ttl: Duration::from_secs(86400),    // 24 hours
            min_ttl: Duration::from_secs(30),
            max_response_size: 1024 * 1024, // 1 MB
        }
    }
}

impl KeySetConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_ttl_bounds(mut self, min_ttl: Duration, max_ttl: Duration) -> Self {
        self.min_ttl = min_ttl;
        self.max_ttl = max_ttl;
        self
    }

    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            "https://auth.example.com",
            "client-1",
            "client-1-secret",
            "http://localhost:8080/oauth_callback",
            "https://accounts.example.com",
        )
    }

    #[test]
    fn test_endpoints_derived_from_auth_host() {
        let endpoints = config().validate().unwrap();
        assert_eq!(endpoints.authorization.as_str(), "https://auth.example.com/auth");
        assert_eq!(endpoints.token.as_str(), "https://auth.example.com/oauth/token");
        assert_eq!(
            endpoints.jwks.as_str(),
            "https://auth.example.com/.well-known/jwks.json"
        );
        assert_eq!(endpoints.signout.as_str(), "https://auth.example.com/signout");
    }

    #[test]
    fn test_auth_host_with_path_and_trailing_slash() {
        let endpoints = Endpoints::from_auth_host("https://example.com/tenant/").unwrap();
        assert_eq!(
            endpoints.token.as_str(),
            "https://example.com/tenant/oauth/token"
        );
    }

    #[test]
    fn test_defaults_and_builders() {
        let config = config()
            .with_state_ttl(60)
            .with_http_timeout(5)
            .with_scopes(vec!["openid".to_string()]);

        assert_eq!(config.state_ttl_seconds, 60);
        assert_eq!(config.http_timeout_seconds, 5);
        assert_eq!(config.scope(), "openid");
        assert_eq!(
            RelyingPartyConfig::new("a", "b", "c", "d", "e").scope(),
            "openid profile"
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let mut bad = config();
        bad.client_id = String::new();
        assert!(matches!(bad.validate(), Err(ConfigError::Invalid(_))));

        let mut bad = config();
        bad.auth_host = "not a url".to_string();
        assert!(matches!(bad.validate(), Err(ConfigError::UrlError(_))));

        let mut bad = config();
        bad.auth_host = "ftp://auth.example.com".to_string();
        assert!(matches!(bad.validate(), Err(ConfigError::Invalid(_))));

        let bad = config().with_http_timeout(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_state_ttl_bounds() {
        for ttl in [0, MAX_STATE_TTL_SECONDS + 1, 10_000_000_000_000, u64::MAX] {
            let result = config().with_state_ttl(ttl).validate();
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "ttl {} gave {:?}",
                ttl,
                result
            );
        }

        assert!(config().with_state_ttl(1).validate().is_ok());
        assert!(config().with_state_ttl(MAX_STATE_TTL_SECONDS).validate().is_ok());
    }
}
