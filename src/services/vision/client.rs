//! Vision model interface used by the analysis service.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the vision model.
///
/// None of these are retried by the gateway; the caller decides.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("request to vision service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("vision service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected vision service response: {0}")]
    Decode(String),
    #[error("Empty model response")]
    EmptyResponse,
    #[error("vision service did not respond within {0:?}")]
    Timeout(Duration),
}

/// One image plus the instruction for the model.
#[derive(Debug, Clone, Copy)]
pub struct VisionRequest<'a> {
    pub image: &'a [u8],
    pub mime_type: &'static str,
    pub prompt: &'a str,
}

/// An external model that turns an image into a textual description.
///
/// Implementations return the raw text; judging emptiness is left to the caller.
#[async_trait]
pub trait VisionModel: Send + Sync {
    // Model identifier (for logging).
    fn model_name(&self) -> &str;

    async fn describe(&self, request: VisionRequest<'_>) -> Result<String, VisionError>;
}
