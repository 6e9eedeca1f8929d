//! Error types for the relying party.

use thiserror::Error;

pub type OidcResult<T> = Result<T, ConfigError>;

/// Misconfiguration detected while wiring the relying party. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure of the back-channel code exchange.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Authorization server error: {error}: {description}")]
    ServerError { error: String, description: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),
}

/// Failure while fetching or searching the remote key set.
#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("No signing keys found in JWKS")]
    NoSigningKeys,

    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge { max_size: usize },
}

/// Rejection of an identity token. There is no partial-trust outcome.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Malformed id_token: {0}")]
    Malformed(String),

    #[error("Unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("Token algorithm {token:?} does not match key algorithm {key:?}")]
    KeyAlgorithmMismatch {
        token: jsonwebtoken::Algorithm,
        key: jsonwebtoken::Algorithm,
    },

    #[error("Signing key is incompatible with the token algorithm")]
    IncompatibleKey,

    #[error("Signing key could not be resolved: {0}")]
    KeyResolution(#[from] JwksError),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unexpected issuer")]
    InvalidIssuer,

    #[error("Unexpected audience")]
    InvalidAudience,

    #[error("Token expired")]
    Expired,

    #[error("Token rejected: {0}")]
    Rejected(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
            ErrorKind::InvalidIssuer => VerificationError::InvalidIssuer,
            ErrorKind::InvalidAudience => VerificationError::InvalidAudience,
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidAlgorithm => VerificationError::IncompatibleKey,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => VerificationError::Malformed(err.to_string()),
            _ => VerificationError::Rejected(err.to_string()),
        }
    }
}

/// Terminal error of a callback, as shown to the user.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Invalid state")]
    InvalidState,

    #[error("Authorization denied: {error}: {description}")]
    AuthorizationDenied { error: String, description: String },

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    #[error("Failed to exchange code: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Failed to verify id_token: {0}")]
    Verification(#[from] VerificationError),
}
