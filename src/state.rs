/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - token verification, quota gate, analysis service
 * - Cloned per request, so everything inside is behind Arc
 * - Owns the single usage ledger instance for the lifetime of the process
 */
use std::sync::Arc;

use crate::services::{
    analysis::AnalysisService,
    auth::TokenVerifier,
    usage::QuotaGate,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<TokenVerifier>,
    pub quota: Arc<QuotaGate>,
    pub analysis: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(
        auth: Arc<TokenVerifier>,
        quota: Arc<QuotaGate>,
        analysis: Arc<AnalysisService>,
    ) -> Self {
        Self {
            auth,
            quota,
            analysis,
        }
    }
}
