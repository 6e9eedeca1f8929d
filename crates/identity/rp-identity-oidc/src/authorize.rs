//! Authorization endpoint redirect construction.

use crate::state::StateStore;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Builds the redirect that starts one sign-in attempt.
#[derive(Clone)]
pub struct AuthorizationRedirector {
    authorization_endpoint: Url,
    state_store: Arc<dyn StateStore>,
}

impl AuthorizationRedirector {
    pub fn new(authorization_endpoint: Url, state_store: Arc<dyn StateStore>) -> Self {
        Self {
            authorization_endpoint,
            state_store,
        }
    }

    /// Issue a fresh state and return the authorize URL carrying it.
    pub async fn build_redirect(&self, client_id: &str, redirect_uri: &str, scope: &str) -> Url {
        let state = self.state_store.issue().await;

        let mut url = self.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", scope)
            .append_pair("state", state.as_str());

        debug!("Built authorization redirect for client {}", client_id);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStateStore;
    use std::collections::HashMap;

    fn redirector(store: Arc<InMemoryStateStore>) -> AuthorizationRedirector {
        AuthorizationRedirector::new(Url::parse("https://example.com/auth").unwrap(), store)
    }

    #[tokio::test]
    async fn test_redirect_url_generation() {
        let store = Arc::new(InMemoryStateStore::default());
        let redirector = redirector(store.clone());

        let url = redirector
            .build_redirect(
                "client-1",
                "http://localhost:8080/oauth_callback",
                "openid profile",
            )
            .await;

        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.path(), "/auth");
        assert!(url.as_str().contains("scope=openid+profile"));

        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(params.get("client_id").map(String::as_str), Some("client-1"));
        assert_eq!(
            params.get("redirect_uri").map(String::as_str),
            Some("http://localhost:8080/oauth_callback")
        );
        assert_eq!(params.get("scope").map(String::as_str), Some("openid profile"));

        // The state in the URL is pending at the moment of redirect.
        let state = params.get("state").unwrap();
        assert_eq!(store.pending_count().await, 1);
        assert!(store.validate_and_consume(state).await);
    }

    #[tokio::test]
    async fn test_each_redirect_uses_distinct_state() {
        let store = Arc::new(InMemoryStateStore::default());
        let redirector = redirector(store.clone());

        let mut handles = vec![];
        for _ in 0..10 {
            let redirector = redirector.clone();
            handles.push(tokio::spawn(async move {
                redirector
                    .build_redirect("client-1", "http://localhost/cb", "openid")
                    .await
            }));
        }

        let mut states = std::collections::HashSet::new();
        for handle in handles {
            let url = handle.await.unwrap();
            let state = url
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            states.insert(state);
        }

        assert_eq!(states.len(), 10);
        assert_eq!(store.pending_count().await, 10);
    }
}
