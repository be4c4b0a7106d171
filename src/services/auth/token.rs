use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};

use crate::services::auth::claims::{Claims, VerifiedToken};
use crate::services::auth::error::AuthError;
use crate::services::auth::jwks::KeyResolver;

/// RS256 bearer-token verifier for identity-provider session tokens.
///
/// - The audience is not checked (the deployment has no fixed audience).
/// - Time claims are checked here rather than by `jsonwebtoken`, so the rules
///   are explicit: `exp`, `nbf` and `iat` are optional, but when present they
///   must hold with `leeway_seconds` of tolerance.
pub struct TokenVerifier {
    keys: Arc<KeyResolver>,
    validation: Validation,
    leeway_seconds: i64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("keys", &self.keys)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyResolver>, leeway_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        Self {
            keys,
            validation,
            leeway_seconds: i64::try_from(leeway_seconds).unwrap_or(i64::MAX),
        }
    }

    /// Verify signature and claims, returning the caller identity.
    pub async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| AuthError::MalformedToken("undecodable header"))?;

        // Pin the algorithm before touching key material.
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::SignatureInvalid);
        }

        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::MalformedToken("missing kid"))?;

        let key = self.keys.resolve(&kid).await?;

        let data = jsonwebtoken::decode::<Claims>(token, &key, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        self.check_time(&data.claims, chrono::Utc::now().timestamp())?;

        let user_id = data
            .claims
            .sub
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingSubject)?
            .to_string();

        Ok(VerifiedToken {
            user_id,
            claims: data.claims,
        })
    }

    fn check_time(&self, claims: &Claims, now: i64) -> Result<(), AuthError> {
        let leeway = self.leeway_seconds;

        if let Some(exp) = claims.exp
            && exp.saturating_add(leeway) <= now
        {
            return Err(AuthError::Expired);
        }
        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(leeway)
        {
            return Err(AuthError::NotYetValid);
        }
        if let Some(iat) = claims.iat
            && iat > now.saturating_add(leeway)
        {
            return Err(AuthError::NotYetValid);
        }
        Ok(())
    }
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::SignatureInvalid,
        ErrorKind::Json(_) => AuthError::MalformedToken("undecodable claims"),
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken("invalid token encoding")
        }
        _ => AuthError::SignatureInvalid,
    }
}
