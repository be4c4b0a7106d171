pub mod client;
pub mod openai;

pub use client::{VisionError, VisionModel, VisionRequest};
pub use openai::OpenAiVisionClient;
