//! Back-channel exchange of an authorization code for tokens.

use crate::error::ExchangeError;
use crate::types::{TokenErrorResponse, TokenResponse};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};
use url::Url;

/// Exchanges an authorization code for a [`TokenResponse`].
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ExchangeError>;
}

/// Confidential-client token exchange using HTTP Basic client authentication.
///
/// A single attempt is made per call; failures are reported, never retried.
#[derive(Clone)]
pub struct TokenExchanger {
    http_client: Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
}

impl TokenExchanger {
    pub fn new(
        http_client: Client,
        token_endpoint: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            token_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl CodeExchanger for TokenExchanger {
    async fn exchange(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ExchangeError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", authorization_code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(self.token_endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Token exchange failed with status {}", status);
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => ExchangeError::ServerError {
                    error: err.error,
                    description: err.error_description.unwrap_or_default(),
                },
                Err(_) => ExchangeError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::InvalidTokenResponse(e.to_string()))?;

        if value.get("error").is_some() {
            let err: TokenErrorResponse = serde_json::from_value(value)
                .map_err(|e| ExchangeError::InvalidTokenResponse(e.to_string()))?;
            error!("Token endpoint reported error: {}", err.error);
            return Err(ExchangeError::ServerError {
                error: err.error,
                description: err.error_description.unwrap_or_default(),
            });
        }

        if let Some(fields) = value.as_object() {
            debug!(
                "Token response fields: {:?}",
                fields.keys().collect::<Vec<_>>()
            );
        }

        let token_response: TokenResponse = serde_json::from_value(value)
            .map_err(|e| ExchangeError::InvalidTokenResponse(e.to_string()))?;

        info!("Successfully exchanged code for tokens");
        Ok(token_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn exchanger(mock_server: &MockServer) -> TokenExchanger {
        TokenExchanger::new(
            Client::new(),
            Url::parse(&format!("{}/oauth/token", mock_server.uri())).unwrap(),
            "client-1",
            "client-1-secret",
        )
    }

    #[tokio::test]
    async fn test_exchange_sends_basic_auth_and_form() {
        let mock_server = MockServer::start().await;

        // base64("client-1:client-1-secret")
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header(
                "Authorization",
                "Basic Y2xpZW50LTE6Y2xpZW50LTEtc2VjcmV0",
            ))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains(
                "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Foauth_callback",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "id_token": "a.b.c",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = exchanger(&mock_server)
            .exchange("abc", "http://localhost:8080/oauth_callback")
            .await
            .unwrap();

        assert_eq!(response.access_token, "tok");
        assert_eq!(response.id_token, "a.b.c");
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
    }

    #[tokio::test]
    async fn test_exchange_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The provided authorization code is invalid"
            })))
            .mount(&mock_server)
            .await;

        let err = exchanger(&mock_server)
            .exchange("bad", "http://localhost/cb")
            .await
            .unwrap_err();

        match err {
            ExchangeError::ServerError { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description, "The provided authorization code is invalid");
            }
            other => panic!("Expected ServerError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_error_status_without_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let err = exchanger(&mock_server)
            .exchange("abc", "http://localhost/cb")
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_exchange_error_field_with_success_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "invalid_client"
            })))
            .mount(&mock_server)
            .await;

        let err = exchanger(&mock_server)
            .exchange("abc", "http://localhost/cb")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::ServerError { ref error, .. } if error == "invalid_client"
        ));
    }

    #[tokio::test]
    async fn test_exchange_malformed_responses() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("code=not-json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("code=no-id-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok"
            })))
            .mount(&mock_server)
            .await;

        let exchanger = exchanger(&mock_server);

        let err = exchanger
            .exchange("not-json", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidTokenResponse(_)));

        let err = exchanger
            .exchange("no-id-token", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InvalidTokenResponse(ref msg) if msg.contains("id_token")
        ));
    }

    #[tokio::test]
    async fn test_exchange_network_failure() {
        // Nothing listens on the discard port.
        let exchanger = TokenExchanger::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/oauth/token").unwrap(),
            "client-1",
            "secret",
        );

        let err = exchanger
            .exchange("abc", "http://localhost/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::HttpError(_)));
    }
}
