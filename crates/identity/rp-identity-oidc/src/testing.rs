//! Test fixtures: RSA signing keys, an RS256 token builder and the matching JWKS.
//!
//! Available to other crates with the `testing` feature. Panics on bad input.

use crate::error::JwksError;
use crate::jwks::{KeyResolver, ResolvedKey};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};

/// Modulus of `testdata/signing_key.pem`, base64url encoded.
pub const SIGNING_KEY_MODULUS: &str = "qNplsB3Cue_8SEMKmr7tj67t6MmuCOKonQhvDMMtF6jEuzjXOH4uQ9Cg19sdIzfIlC8xIRhFY9vdcjrMD1MnjofwHvwk5cpAhaw1xvn2ieGMZ2U-BkIA3E-zd0DQn7yicICSnwCOx1VfH34vzMc_Lz7isqOzRS7KvydW6wzG-J8xXZrHopBHJW2rolG4p6UL1OiJ2iXe_uFgPN4GKRk5nP0P_3WBFfkuzCEUXBv7cpST_DChOcT3_zB9FI7VCQ4EwzYhyM0RXxEZYaGi1JX6GsU_ZIFQ6MW_wFPLXZV2WK_-RM0He6cvcY4FFui7X_BnVG1A66cZbeR08DKbt24lCw";

const SIGNING_KEY_PEM: &str = include_str!("../testdata/signing_key.pem");
const ROGUE_KEY_PEM: &str = include_str!("../testdata/rogue_key.pem");

/// Signs RS256 identity tokens with one of the fixture keys.
pub struct TokenFactory {
    key: EncodingKey,
    kid: Option<String>,
}

impl TokenFactory {
    pub const SIGNING_KID: &'static str = "signing-key-1";
    pub const ROGUE_KID: &'static str = "rogue-key-1";

    fn from_pem(pem: &str, kid: &str) -> Self {
        Self {
            key: EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
            kid: Some(kid.to_string()),
        }
    }

    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid.clone();
        encode(&header, claims, &self.key).unwrap()
    }
}

/// Factory for the key published in [`jwks_document`].
pub fn signing_factory() -> TokenFactory {
    TokenFactory::from_pem(SIGNING_KEY_PEM, TokenFactory::SIGNING_KID)
}

/// Factory for a key the authorization server never published.
pub fn rogue_factory() -> TokenFactory {
    TokenFactory::from_pem(ROGUE_KEY_PEM, TokenFactory::ROGUE_KID)
}

/// Claims of a valid token for `audience`, expiring in one hour.
pub fn standard_claims(issuer: &str, audience: &str) -> serde_json::Value {
    let now = chrono::Utc::now().timestamp();
    serde_json::json!({
        "iss": issuer,
        "sub": "user-123",
        "aud": audience,
        "iat": now,
        "exp": now + 3600,
        "name": "Test User",
        "email": "user@example.com"
    })
}

/// JWKS publishing the signing key only.
pub fn jwks_document() -> serde_json::Value {
    serde_json::json!({
        "keys": [{
            "kty": "RSA",
            "kid": TokenFactory::SIGNING_KID,
            "use": "sig",
            "alg": "RS256",
            "n": SIGNING_KEY_MODULUS,
            "e": "AQAB"
        }]
    })
}

/// In-memory key set holding only the fixture signing key.
pub struct FixtureKeys {
    keys: Vec<ResolvedKey>,
}

impl Default for FixtureKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureKeys {
    pub fn new() -> Self {
        Self {
            keys: vec![ResolvedKey {
                kid: Some(TokenFactory::SIGNING_KID.to_string()),
                key: DecodingKey::from_rsa_components(SIGNING_KEY_MODULUS, "AQAB").unwrap(),
                algorithm: Some(Algorithm::RS256),
            }],
        }
    }
}

#[async_trait]
impl KeyResolver for FixtureKeys {
    async fn resolve(&self, kid: &str) -> Result<ResolvedKey, JwksError> {
        self.keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid))
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
    }

    async fn signing_keys(&self) -> Result<Vec<ResolvedKey>, JwksError> {
        Ok(self.keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Validation, decode};

    #[tokio::test]
    async fn test_published_key_verifies_signing_factory_tokens() {
        let token = signing_factory().sign(&standard_claims("issuer", "client-1"));
        let key = FixtureKeys::default()
            .resolve(TokenFactory::SIGNING_KID)
            .await
            .unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["client-1"]);
        let data = decode::<serde_json::Value>(&token, &key.key, &validation).unwrap();
        assert_eq!(data.claims["sub"], "user-123");

        let document = jwks_document();
        assert_eq!(document["keys"][0]["n"], SIGNING_KEY_MODULUS);
        assert_eq!(document["keys"][0]["kid"], TokenFactory::SIGNING_KID);
    }
}
