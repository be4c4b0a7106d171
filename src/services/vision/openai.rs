use std::fmt;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::VisionConfig;
use crate::services::vision::client::{VisionError, VisionModel, VisionRequest};

/// Chat-completions client that sends the image inline as a base64 `data:` URL.
///
/// Works against OpenAI and any endpoint speaking the same protocol.
#[derive(Clone)]
pub struct OpenAiVisionClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for OpenAiVisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the API key
        f.debug_struct("OpenAiVisionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiVisionClient {
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vision-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: chat_completions_url(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

fn chat_completions_url(base: &Url) -> Url {
    let mut url = base.clone();
    let path = format!("{}/chat/completions", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn data_url(mime_type: &str, image: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(image);
    format!("data:{};base64,{}", mime_type, encoded)
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn describe(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: [
                    ContentPart::Text {
                        text: request.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url(request.mime_type, request.image),
                        },
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            // Prefer the provider's own message; fall back to the raw body.
            let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(VisionError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| VisionError::Decode(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::Decode("no choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(content)
    }
}
