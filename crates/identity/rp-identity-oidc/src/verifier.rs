//! Identity token verification.
//!
//! Nothing in an `id_token` may be used before [`TokenVerifier::verify`] has
//! returned successfully. The only way to obtain a [`VerifiedIdToken`] is
//! through a verifier, so downstream code that takes one cannot be handed
//! unverified claims.

use crate::error::VerificationError;
use crate::jwks::{KeyResolver, ResolvedKey};
use crate::types::IdTokenClaims;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Claims of an identity token whose signature, issuer, audience and expiry
/// have been checked.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct VerifiedIdToken {
    claims: IdTokenClaims,
}

impl VerifiedIdToken {
    pub fn claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    /// Stable user identifier at the issuer.
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn into_claims(self) -> IdTokenClaims {
        self.claims
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(
        &self,
        identity_token: &str,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> Result<VerifiedIdToken, VerificationError>;
}

/// Verifies `id_token`s against the authorization server's published keys.
#[derive(Clone)]
pub struct IdTokenVerifier {
    keys: Arc<dyn KeyResolver>,
    leeway_seconds: u64,
}

impl IdTokenVerifier {
    pub fn new(keys: Arc<dyn KeyResolver>) -> Self {
        Self {
            keys,
            leeway_seconds: 0,
        }
    }

    /// Clock skew tolerated on `exp`.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    fn validation(&self, algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = true;
        validation.leeway = self.leeway_seconds;
        validation
    }

    fn verify_with_key(
        &self,
        token: &str,
        key: &ResolvedKey,
        algorithm: Algorithm,
        validation: &Validation,
    ) -> Result<VerifiedIdToken, VerificationError> {
        if let Some(key_algorithm) = key.algorithm
            && key_algorithm != algorithm
        {
            return Err(VerificationError::KeyAlgorithmMismatch {
                token: algorithm,
                key: key_algorithm,
            });
        }

        let data = decode::<IdTokenClaims>(token, &key.key, validation)?;
        Ok(VerifiedIdToken {
            claims: data.claims,
        })
    }
}

#[async_trait]
impl TokenVerifier for IdTokenVerifier {
    async fn verify(
        &self,
        identity_token: &str,
        expected_issuer: &str,
        expected_audience: &str,
    ) -> Result<VerifiedIdToken, VerificationError> {
        let header = decode_header(identity_token)?;

        // Shared-secret algorithms would let anyone holding the public key forge tokens.
        if !is_asymmetric(header.alg) {
            warn!("Rejected id_token signed with {:?}", header.alg);
            return Err(VerificationError::UnsupportedAlgorithm(header.alg));
        }

        let candidates = match header.kid.as_deref() {
            Some(kid) => vec![self.keys.resolve(kid).await?],
            None => self.keys.signing_keys().await?,
        };

        let validation = self.validation(header.alg, expected_issuer, expected_audience);

        let mut last_error = VerificationError::InvalidSignature;
        for key in &candidates {
            match self.verify_with_key(identity_token, key, header.alg, &validation) {
                Ok(verified) => {
                    debug!(
                        "Verified id_token for subject {} issued by {}",
                        verified.subject(),
                        verified.claims().iss
                    );
                    return Ok(verified);
                }
                // Only a key mismatch means another key might fit.
                Err(
                    err @ (VerificationError::InvalidSignature
                    | VerificationError::IncompatibleKey
                    | VerificationError::KeyAlgorithmMismatch { .. }),
                ) => last_error = err,
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }
}

fn is_asymmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}
