//! Redirect callback handling.
//!
//! A callback moves through a fixed pipeline, one stage at a time:
//!
//! ```text
//! AwaitingCallback -> StateValidated -> TokenExchanged -> IdentityVerified -> Success
//!         \________________\_________________\__________________________-> Error
//! ```
//!
//! No stage can be skipped or reordered, and the claims only exist once the
//! `IdentityVerified` stage has been reached. The orchestrator keeps nothing
//! between invocations; the only durable state is in the [`StateStore`].

use crate::error::CallbackError;
use crate::exchange::CodeExchanger;
use crate::state::StateStore;
use crate::types::{CallbackParams, TokenResponse};
use crate::verifier::{TokenVerifier, VerifiedIdToken};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Non-terminal stages of a callback.
#[derive(Debug)]
pub(crate) enum CallbackStage {
    AwaitingCallback(CallbackParams),
    StateValidated {
        code: String,
    },
    TokenExchanged(TokenResponse),
    IdentityVerified {
        tokens: TokenResponse,
        identity: VerifiedIdToken,
    },
}

impl CallbackStage {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            CallbackStage::AwaitingCallback(_) => "awaiting_callback",
            CallbackStage::StateValidated { .. } => "state_validated",
            CallbackStage::TokenExchanged(_) => "token_exchanged",
            CallbackStage::IdentityVerified { .. } => "identity_verified",
        }
    }
}

/// Result of one [`CallbackStage`] transition.
#[derive(Debug)]
pub(crate) enum Transition {
    Next(CallbackStage),
    Complete(SignIn),
}

/// A completed sign-in: the full token response and the verified claims.
#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub tokens: TokenResponse,
    pub identity: VerifiedIdToken,
}

/// Terminal outcome of a callback.
#[derive(Debug)]
pub enum CallbackOutcome {
    Success(SignIn),
    Error(CallbackError),
}

impl CallbackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Success(_))
    }
}

/// Drives a callback from state validation to a verified identity.
///
/// [`handle`](Self::handle) is the only entry point; the stages are not
/// reachable from outside this crate, so a callback cannot start past the
/// state check.
///
/// ```compile_fail
/// use rp_identity_oidc::callback::CallbackStage;
///
/// let _ = CallbackStage::StateValidated { code: "abc".to_string() };
/// ```
#[derive(Clone)]
pub struct CallbackOrchestrator {
    state_store: Arc<dyn StateStore>,
    exchanger: Arc<dyn CodeExchanger>,
    verifier: Arc<dyn TokenVerifier>,
    redirect_uri: String,
    expected_issuer: String,
    client_id: String,
}

impl CallbackOrchestrator {
    pub fn new(
        state_store: Arc<dyn StateStore>,
        exchanger: Arc<dyn CodeExchanger>,
        verifier: Arc<dyn TokenVerifier>,
        redirect_uri: impl Into<String>,
        expected_issuer: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            state_store,
            exchanger,
            verifier,
            redirect_uri: redirect_uri.into(),
            expected_issuer: expected_issuer.into(),
            client_id: client_id.into(),
        }
    }

    /// Run the pipeline to a terminal outcome. Never fails.
    pub async fn handle(&self, params: CallbackParams) -> CallbackOutcome {
        let mut stage = CallbackStage::AwaitingCallback(params);

        loop {
            let current = stage.name();
            match self.advance(stage).await {
                Ok(Transition::Next(next)) => {
                    debug!("Callback advanced from {} to {}", current, next.name());
                    stage = next;
                }
                Ok(Transition::Complete(sign_in)) => {
                    info!(
                        "Sign-in completed for subject {} issued by {}",
                        sign_in.identity.subject(),
                        sign_in.identity.claims().iss
                    );
                    return CallbackOutcome::Success(sign_in);
                }
                Err(err) => {
                    warn!("Callback failed at {}: {}", current, err);
                    return CallbackOutcome::Error(err);
                }
            }
        }
    }

    /// Perform exactly one transition.
    pub(crate) async fn advance(&self, stage: CallbackStage) -> Result<Transition, CallbackError> {
        match stage {
            CallbackStage::AwaitingCallback(params) => {
                let state = params.state.as_deref().ok_or(CallbackError::InvalidState)?;
                if !self.state_store.validate_and_consume(state).await {
                    return Err(CallbackError::InvalidState);
                }

                if let Some(error) = params.error {
                    return Err(CallbackError::AuthorizationDenied {
                        error,
                        description: params.error_description.unwrap_or_default(),
                    });
                }

                let code = params
                    .code
                    .filter(|code| !code.is_empty())
                    .ok_or(CallbackError::MissingAuthorizationCode)?;

                Ok(Transition::Next(CallbackStage::StateValidated { code }))
            }
            CallbackStage::StateValidated { code } => {
                let tokens = self.exchanger.exchange(&code, &self.redirect_uri).await?;
                Ok(Transition::Next(CallbackStage::TokenExchanged(tokens)))
            }
            CallbackStage::TokenExchanged(tokens) => {
                let identity = self
                    .verifier
                    .verify(&tokens.id_token, &self.expected_issuer, &self.client_id)
                    .await?;
                Ok(Transition::Next(CallbackStage::IdentityVerified {
                    tokens,
                    identity,
                }))
            }
            CallbackStage::IdentityVerified { tokens, identity } => {
                Ok(Transition::Complete(SignIn { tokens, identity }))
            }
        }
    }
}
