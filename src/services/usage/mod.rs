pub mod ledger;
pub mod quota;

pub use ledger::{InMemoryUsageLedger, UsageLedger};
pub use quota::{QuotaExceeded, QuotaGate, QuotaPolicy, UsageSnapshot};
