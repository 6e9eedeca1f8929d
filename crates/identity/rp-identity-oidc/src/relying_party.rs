//! Relying party facade wiring the sign-in components together.

use crate::authorize::AuthorizationRedirector;
use crate::callback::{CallbackOrchestrator, CallbackOutcome};
use crate::config::{Endpoints, RelyingPartyConfig};
use crate::error::OidcResult;
use crate::exchange::TokenExchanger;
use crate::jwks::RemoteKeySet;
use crate::state::{InMemoryStateStore, StateStore};
use crate::types::CallbackParams;
use crate::verifier::IdTokenVerifier;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// A confidential OAuth2/OIDC client registered at one authorization server.
///
/// Cloning is cheap; clones share the state store and the key set cache.
#[derive(Clone)]
pub struct RelyingParty {
    config: Arc<RelyingPartyConfig>,
    endpoints: Arc<Endpoints>,
    state_store: Arc<dyn StateStore>,
    redirector: AuthorizationRedirector,
    orchestrator: CallbackOrchestrator,
}

impl RelyingParty {
    pub fn new(config: RelyingPartyConfig) -> OidcResult<Self> {
        let state_store: Arc<dyn StateStore> =
            Arc::new(InMemoryStateStore::new(config.state_ttl_seconds));
        Self::with_state_store(config, state_store)
    }

    /// Build a relying party on top of a caller supplied state store.
    pub fn with_state_store(
        config: RelyingPartyConfig,
        state_store: Arc<dyn StateStore>,
    ) -> OidcResult<Self> {
        let endpoints = config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        let redirector =
            AuthorizationRedirector::new(endpoints.authorization.clone(), state_store.clone());

        let exchanger = Arc::new(TokenExchanger::new(
            http_client.clone(),
            endpoints.token.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        ));

        let key_set = Arc::new(RemoteKeySet::new(
            http_client,
            endpoints.jwks.clone(),
            config.jwks.clone(),
        ));
        let verifier = Arc::new(IdTokenVerifier::new(key_set));

        let orchestrator = CallbackOrchestrator::new(
            state_store.clone(),
            exchanger,
            verifier,
            config.redirect_uri.clone(),
            config.expected_issuer.clone(),
            config.client_id.clone(),
        );

        info!(
            "Relying party {} configured against {}",
            config.client_id, config.auth_host
        );

        Ok(Self {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            state_store,
            redirector,
            orchestrator,
        })
    }

    /// Start a sign-in attempt: returns the authorize URL to redirect the user agent to.
    pub async fn start_sign_in(&self) -> Url {
        self.redirector
            .build_redirect(
                &self.config.client_id,
                &self.config.redirect_uri,
                &self.config.scope(),
            )
            .await
    }

    pub async fn complete_sign_in(&self, params: CallbackParams) -> CallbackOutcome {
        self.orchestrator.handle(params).await
    }

    pub fn signout_url(&self) -> &Url {
        &self.endpoints.signout
    }

    pub fn auth_host(&self) -> &str {
        &self.config.auth_host
    }

    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// Drop pending states past their TTL. Returns how many were removed.
    pub async fn cleanup_expired_states(&self) -> usize {
        let removed = self.state_store.cleanup_expired().await;
        if removed > 0 {
            debug!("Removed {} expired sign-in states", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new(
            "https://auth.example.com/",
            "client-1",
            "client-1-secret",
            "http://localhost:8080/oauth_callback",
            "https://accounts.example.com",
        )
    }

    #[tokio::test]
    async fn test_start_sign_in_targets_authorize_endpoint() {
        let rp = RelyingParty::new(config()).unwrap();

        let url = rp.start_sign_in().await;
        assert_eq!(url.path(), "/auth");
        assert_eq!(url.host_str(), Some("auth.example.com"));
        assert!(url.query().unwrap().contains("scope=openid+profile"));
        assert_eq!(rp.signout_url().as_str(), "https://auth.example.com/signout");
    }

    #[tokio::test]
    async fn test_clones_share_state_store() {
        let rp = RelyingParty::new(config()).unwrap();
        let clone = rp.clone();

        rp.start_sign_in().await;
        clone.start_sign_in().await;

        assert_eq!(rp.state_store.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_states() {
        let store = Arc::new(InMemoryStateStore::new(0));
        let rp = RelyingParty::with_state_store(config(), store).unwrap();
        rp.start_sign_in().await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(rp.cleanup_expired_states().await, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = RelyingParty::new(config().with_scopes(vec![]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_out_of_range_state_ttl_is_rejected_at_startup() {
        for ttl in [0, 10_000_000_000_000] {
            let result = RelyingParty::new(config().with_state_ttl(ttl));
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
        }
    }
}
