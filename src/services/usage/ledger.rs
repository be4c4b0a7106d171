//! Per-identity usage counters.
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

/// Usage accounting backend.
///
/// The gateway only ever reads a count or adds one to it; there is no
/// decrement, reset or expiry.
///
/// Implementations must make `commit` atomic per identity: concurrent commits
/// never observe the same pre-increment value.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    // Returns the backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Current count for `identity`; 0 when never seen. Never mutates.
    async fn peek(&self, identity: &str) -> u64;

    // Add one to `identity`'s count and return the new value.
    async fn commit(&self, identity: &str) -> u64;
}

/// Process-local ledger. Counts live as long as the process does.
#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // A panic while holding the guard cannot leave a half-written counter
        // behind, so a poisoned map is still consistent.
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn peek(&self, identity: &str) -> u64 {
        self.counts().get(identity).copied().unwrap_or(0)
    }

    async fn commit(&self, identity: &str) -> u64 {
        let mut counts = self.counts();
        let count = counts.entry(identity.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }
}
