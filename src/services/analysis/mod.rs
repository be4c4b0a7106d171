pub mod service;
pub mod upload;

use thiserror::Error;

use crate::services::vision::VisionError;

pub use service::{AnalysisOutcome, AnalysisService};
pub use upload::{ImageFormat, ImageUpload, UnknownExtension, UploadPolicy};

/// Request-scoped failures of the analysis step.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid file type. Allowed: {allowed}.")]
    UnsupportedType { allowed: String },
    #[error("File too large. Max size is {limit}.")]
    PayloadTooLarge { limit: String },
    #[error("Vision analysis failed: {0}")]
    UpstreamAnalysisFailed(#[source] VisionError),
}
