/*
 * Responsibility
 * - GET /api/usage: the caller's tier, count and limit
 * - Read-only; never touches the ledger's counts
 */
use axum::{Json, extract::State};

use crate::{
    api::{dto::UsageResponse, extractors::AuthCtxExtractor},
    state::AppState,
};

pub async fn usage(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Json<UsageResponse> {
    let snapshot = state.quota.usage(&ctx.user_id, ctx.tier).await;
    Json(snapshot.into())
}
