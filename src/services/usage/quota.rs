//! Admission check run before any expensive work.
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::services::auth::Tier;
use crate::services::usage::ledger::UsageLedger;

/// Rejection for a free-tier caller who has used up the allowance.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error(
    "Free tier limit reached ({limit} {} per session). Upgrade to premium for unlimited analyses.",
    analysis_noun(.limit)
)]
pub struct QuotaExceeded {
    pub limit: u64,
}

fn analysis_noun(limit: &u64) -> &'static str {
    if *limit == 1 { "analysis" } else { "analyses" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub free_limit: u64,
}

impl QuotaPolicy {
    pub fn new(free_limit: u64) -> Self {
        Self { free_limit }
    }

    /// `None` means unbounded.
    pub fn limit_for(&self, tier: Tier) -> Option<u64> {
        match tier {
            Tier::Premium => None,
            Tier::Free => Some(self.free_limit),
        }
    }

    pub fn check(&self, tier: Tier, used: u64) -> Result<(), QuotaExceeded> {
        match self.limit_for(tier) {
            Some(limit) if used >= limit => Err(QuotaExceeded { limit }),
            _ => Ok(()),
        }
    }
}

/// Snapshot of a caller's standing, as reported by `GET /api/usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub tier: Tier,
    pub used: u64,
    pub limit: Option<u64>,
}

/// Combines the tier policy with the ledger's current count.
pub struct QuotaGate {
    ledger: Arc<dyn UsageLedger>,
    policy: QuotaPolicy,
}

impl QuotaGate {
    pub fn new(ledger: Arc<dyn UsageLedger>, policy: QuotaPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> QuotaPolicy {
        self.policy
    }

    pub async fn usage(&self, identity: &str, tier: Tier) -> UsageSnapshot {
        UsageSnapshot {
            tier,
            used: self.ledger.peek(identity).await,
            limit: self.policy.limit_for(tier),
        }
    }

    /// Admit or reject `identity` based on its current count.
    ///
    /// This only reads. The count moves when the analysis commits, so an
    /// admitted request that later fails costs nothing.
    pub async fn admit(&self, identity: &str, tier: Tier) -> Result<UsageSnapshot, QuotaExceeded> {
        let snapshot = self.usage(identity, tier).await;

        if let Err(err) = self.policy.check(tier, snapshot.used) {
            tracing::info!(
                user_id = %identity,
                used = snapshot.used,
                limit = err.limit,
                "free tier quota exhausted"
            );
            return Err(err);
        }

        Ok(snapshot)
    }
}
