//! OAuth2 authorization code flow for a confidential relying party, with
//! OpenID Connect `id_token` verification against the authorization server's
//! published key set.
//!
//! The flow has two halves. [`RelyingParty::start_sign_in`] issues a one-time
//! state and returns the authorize URL to redirect the user agent to.
//! [`RelyingParty::complete_sign_in`] handles the redirect back: it consumes
//! the state, exchanges the code for tokens and verifies the `id_token`
//! before any claim is exposed.

pub mod authorize;
pub mod callback;
pub mod config;
pub mod error;
pub mod exchange;
pub mod jwks;
pub mod relying_party;
pub mod state;
pub mod types;
pub mod verifier;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use authorize::AuthorizationRedirector;
pub use callback::{CallbackOrchestrator, CallbackOutcome, SignIn};
pub use config::{Endpoints, KeySetConfig, RelyingPartyConfig};
pub use error::{
    CallbackError, ConfigError, ExchangeError, JwksError, OidcResult, VerificationError,
};
pub use exchange::{CodeExchanger, TokenExchanger};
pub use jwks::{KeyResolver, RemoteKeySet, ResolvedKey};
pub use relying_party::RelyingParty;
pub use state::{InMemoryStateStore, PendingState, StateStore, StateToken};
pub use types::{Audience, CallbackParams, IdTokenClaims, TokenErrorResponse, TokenResponse};
pub use verifier::{IdTokenVerifier, TokenVerifier, VerifiedIdToken};
