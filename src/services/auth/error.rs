use thiserror::Error;

use crate::services::auth::jwks::KeyResolutionError;

/// Why a bearer token was not accepted.
///
/// Every kind maps to the same 401 on the wire; the distinction is for logs.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("signing key resolution failed: {0}")]
    KeyResolutionFailed(#[from] KeyResolutionError),
    #[error("invalid token signature or algorithm")]
    SignatureInvalid,
    #[error("malformed token: {0}")]
    MalformedToken(&'static str),
    #[error("token has no subject")]
    MissingSubject,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

impl AuthError {
    /// Stable identifier for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::KeyResolutionFailed(_) => "key_resolution_failed",
            Self::SignatureInvalid => "signature_invalid",
            Self::MalformedToken(_) => "malformed_token",
            Self::MissingSubject => "missing_subject",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
        }
    }
}
