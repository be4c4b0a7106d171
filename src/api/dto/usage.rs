use serde::Serialize;

use crate::services::analysis::AnalysisOutcome;
use crate::services::auth::Tier;
use crate::services::usage::UsageSnapshot;

/// `GET /api/usage` body. `limit` is `null` for unbounded tiers.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub tier: Tier,
    pub used: u64,
    pub limit: Option<u64>,
}

impl From<UsageSnapshot> for UsageResponse {
    fn from(s: UsageSnapshot) -> Self {
        Self {
            tier: s.tier,
            used: s.used,
            limit: s.limit,
        }
    }
}

/// `POST /api/analyze` body.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub tier: Tier,
    pub used: u64,
    pub limit: Option<u64>,
    pub description: String,
}

impl From<AnalysisOutcome> for AnalyzeResponse {
    fn from(o: AnalysisOutcome) -> Self {
        Self {
            tier: o.tier,
            used: o.used,
            limit: o.limit,
            description: o.description,
        }
    }
}
