/*
 * Responsibility
 * - URL structure under /api
 * - /health is public; /usage and /analyze sit behind the bearer middleware
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware;
use crate::state::AppState;

use crate::api::handlers::{analyze::analyze, health::health, usage::usage};

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/usage", get(usage))
        .route("/analyze", post(analyze));
    let protected = middleware::auth::access::apply(protected, state);

    Router::new().route("/health", get(health)).merge(protected)
}
