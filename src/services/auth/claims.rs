use serde::Deserialize;
use serde_json::{Map, Value};

/// Decoded token payload.
///
/// Only the claims the gateway acts on are typed; everything else is kept in
/// `extra`. `public_metadata` stays untyped because the identity provider
/// lets operators put arbitrary JSON there.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub public_metadata: Value,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims that passed verification, with the subject promoted to the caller id.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: String,
    pub claims: Claims,
}
