/*
 * Responsibility
 * - The authenticated-caller type handlers see
 * - The auth middleware verifies the token, resolves the tier and stores this
 *   in request extensions; handlers only ever receive this type
 */
use crate::services::auth::Tier;

/// Context attached to an authenticated request.
///
/// - `user_id` is the token's `sub`, opaque to the gateway
/// - `tier` is resolved once per request from the verified claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub user_id: String,
    pub tier: Tier,
}

impl AuthCtx {
    pub fn new(user_id: impl Into<String>, tier: Tier) -> Self {
        Self {
            user_id: user_id.into(),
            tier,
        }
    }
}
