use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Which model a request is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheap, fast classification pass.
    Triage,
    /// Full appraisal with optional extended reasoning.
    Deep,
}

/// One photo, base64 encoded, ready to embed in a request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub source: PathBuf,
    pub media_type: &'static str,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub tier: ModelTier,
    pub images: Arc<[EncodedImage]>,
    pub prompt: String,
    pub max_tokens: u32,
    /// Extended reasoning budget in tokens, when enabled.
    pub thinking_budget: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningReply {
    /// Concatenated text blocks of the answer.
    pub text: String,
    /// Reasoning trace, if the provider returned one.
    pub thinking: Option<String>,
}

/// Vision-capable reasoning backend.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningReply>;

    /// Model name used for a tier, for logging and the config endpoint.
    fn model_name(&self, tier: ModelTier) -> &str;
}
