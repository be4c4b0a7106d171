//! Bearer token verification → AuthCtx in request extensions.
//!
//! - `Authorization: Bearer <jwt>` is verified against the provider's JWKS
//! - the subscription tier is resolved from the verified claims
//! - handlers read the result through `AuthCtxExtractor`

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::{AuthError, Tier};
use crate::state::AppState;

/// Require a verified bearer token on every route of `router`.
///
/// ```ignore
/// let protected = Router::new().route("/usage", get(usage));
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // `from_fn` cannot take a State extractor in axum 0.8, so pass it explicitly
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Owned: the request (and its body) must not stay borrowed across the await.
    let token = bearer_token(&req).map(str::to_owned).ok_or_else(|| {
        tracing::debug!("request without bearer token");
        AppError::from(AuthError::MissingToken)
    })?;

    let verified = match state.auth.verify(&token).await {
        Ok(verified) => verified,
        Err(err) => {
            tracing::warn!(
                kind = err.kind(),
                error = %err,
                "access token verification failed"
            );
            return Err(err.into());
        }
    };

    let tier = Tier::from_claims(&verified.claims);
    let auth_ctx = AuthCtx::new(verified.user_id, tier);

    // middleware → extractor
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
