//! HTTP vision provider
//!
//! Speaks the OpenAI-style `/chat/completions` API with an inline base64
//! image, one request per model candidate. Works against OpenRouter, vLLM,
//! LocalAI, llama-server, and anything else that implements the same shape.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderError, VisionProvider};

/// Provider API version reported in attempt diagnostics
const API_VERSION: &str = "v1";

/// Vision provider over the OpenAI-compatible chat completions API
#[derive(Clone)]
pub struct ChatVisionProvider {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatVisionProvider {
    /// Create a new provider
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.to_string()),
        }
    }

    /// Get the provider base URL (for logging)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl VisionProvider for ChatVisionProvider {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, ProviderError> {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image);

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime, base64_image),
                        },
                    },
                ],
            }],
            temperature: Some(0.1),
            max_tokens: Some(4096),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Transport("empty choices in provider response".into()))
    }

    fn api_version(&self) -> &str {
        API_VERSION
    }
}

/// Truncate long provider error bodies for diagnostics
fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Chat message with multimodal content parts
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

/// One part of a multimodal message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference (data URL for inline upload)
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let provider = ChatVisionProvider::new("http://localhost:8000/v1/", None);
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 200), "short");
        let long = "x".repeat(300);
        let out = truncate(&long, 200);
        assert_eq!(out.len(), 203);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_content_part_serialization() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: "data:image/jpeg;base64,AAAA".into(),
            },
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }
}
