use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::service::{ModelTier, ReasoningReply, ReasoningRequest, ReasoningService};
use crate::error::{RelicError, Result};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub base_url: String,
    pub deep_model: String,
    pub triage_model: String,
    pub timeout: Duration,
}

impl AnthropicSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            deep_model: "claude-sonnet-4-20250514".to_string(),
            triage_model: "claude-3-5-haiku-20241022".to_string(),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Messages API client implementing [`ReasoningService`].
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    settings: AnthropicSettings,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.settings.base_url)
            .field("deep_model", &self.settings.deep_model)
            .field("triage_model", &self.settings.triage_model)
            .field("timeout", &self.settings.timeout)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(settings: AnthropicSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| RelicError::service(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, settings })
    }

    fn build_body<'a>(&'a self, request: &'a ReasoningRequest) -> MessagesRequest<'a> {
        let mut content: Vec<ContentBlock<'a>> = request
            .images
            .iter()
            .map(|image| ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: image.media_type,
                    data: &image.data,
                },
            })
            .collect();
        content.push(ContentBlock::Text {
            text: &request.prompt,
        });

        MessagesRequest {
            model: self.model_name(request.tier),
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user",
                content,
            }],
            thinking: request.thinking_budget.map(|budget_tokens| Thinking {
                kind: "enabled",
                budget_tokens,
            }),
        }
    }
}

#[async_trait]
impl ReasoningService for AnthropicClient {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningReply> {
        let url = format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'));
        let body = self.build_body(&request);

        debug!(
            target: "relic::analysis",
            model = body.model,
            images = request.images.len(),
            thinking = request.thinking_budget.is_some(),
            "sending reasoning request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    RelicError::service("reasoning request timed out")
                } else {
                    RelicError::service(format!("reasoning request failed: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = match status {
                StatusCode::UNAUTHORIZED => "invalid API key".to_string(),
                StatusCode::TOO_MANY_REQUESTS => "rate limited".to_string(),
                _ => format!("HTTP {status}: {error_text}"),
            };
            return Err(RelicError::Service {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|err| RelicError::service(format!("unreadable reasoning response: {err}")))?;

        Ok(parsed.into_reply())
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Triage => &self.settings.triage_model,
            ModelTier::Deep => &self.settings.deep_model,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn into_reply(self) -> ReasoningReply {
        let mut text = String::new();
        let mut thinking: Option<String> = None;
        for block in self.content {
            match block {
                ResponseBlock::Text { text: chunk } => text.push_str(&chunk),
                ResponseBlock::Thinking { thinking: chunk } => {
                    thinking.get_or_insert_with(String::new).push_str(&chunk)
                }
                ResponseBlock::Other => {}
            }
        }
        ReasoningReply { text, thinking }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::service::EncodedImage;

    #[test]
    fn request_body_carries_images_prompt_and_budget() {
        let client = AnthropicClient::new(AnthropicSettings::new("key")).unwrap();
        let request = ReasoningRequest {
            tier: ModelTier::Deep,
            images: Arc::from(vec![EncodedImage {
                source: "a.jpg".into(),
                media_type: "image/jpeg",
                data: "AAAA".into(),
            }]),
            prompt: "appraise".into(),
            max_tokens: 16000,
            thinking_budget: Some(10000),
        };

        let body = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(body["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["messages"][0]["content"][0]["type"], "image");
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "image/jpeg");
        assert_eq!(body["messages"][0]["content"][1]["text"], "appraise");
        assert_eq!(body["thinking"]["budget_tokens"], 10000);
    }

    #[test]
    fn reply_joins_text_and_keeps_thinking() {
        let raw = r#"{"content": [
            {"type": "thinking", "thinking": "looks like Pyrex", "signature": "x"},
            {"type": "text", "text": "{\"a\":"},
            {"type": "text", "text": "1}"},
            {"type": "tool_use", "id": "t"}
        ]}"#;
        let reply = serde_json::from_str::<MessagesResponse>(raw).unwrap().into_reply();
        assert_eq!(reply.text, "{\"a\":1}");
        assert_eq!(reply.thinking.as_deref(), Some("looks like Pyrex"));
    }
}
