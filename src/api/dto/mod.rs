pub mod usage;

pub use usage::{AnalyzeResponse, UsageResponse};
