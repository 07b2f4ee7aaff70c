//! Photo appraisal against a vision-capable reasoning service.
//!
//! [`AnalysisOrchestrator`] runs either a single appraisal request or a
//! two-stage flow: a cheap triage pass (optionally asking the operator
//! questions through an [`AnswerProvider`]) followed by a deep elaboration
//! pass seeded with the triage result.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use relic_model::ItemAnalysis;
use tracing::{debug, info};

pub mod anthropic;
pub mod images;
pub mod parse;
pub mod prompt;
pub mod service;

pub use anthropic::{AnthropicClient, AnthropicSettings};
pub use parse::Triage;
pub use service::{EncodedImage, ModelTier, ReasoningReply, ReasoningRequest, ReasoningService};

use crate::error::Result;

/// Token budget granted to extended reasoning.
pub const THINKING_BUDGET: u32 = 10_000;
const DEEP_MAX_TOKENS: u32 = 16_000;
const TRIAGE_MAX_TOKENS: u32 = 2_000;

/// Answers clarifying questions raised during triage, e.g. by prompting the
/// operator at a terminal.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn answer(&self, question: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    #[default]
    SinglePass,
    TwoStage,
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub mode: AnalysisMode,
    pub extended_thinking: bool,
    pub target_platforms: Vec<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::SinglePass,
            extended_thinking: true,
            target_platforms: Vec::new(),
        }
    }
}

impl AnalysisOptions {
    fn thinking_budget(&self) -> Option<u32> {
        self.extended_thinking.then_some(THINKING_BUDGET)
    }
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    service: Arc<dyn ReasoningService>,
    answers: Option<Arc<dyn AnswerProvider>>,
}

impl fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("deep_model", &self.service.model_name(ModelTier::Deep))
            .field("triage_model", &self.service.model_name(ModelTier::Triage))
            .field("interactive", &self.answers.is_some())
            .finish()
    }
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn ReasoningService>) -> Self {
        Self {
            service,
            answers: None,
        }
    }

    pub fn with_answer_provider(mut self, answers: Arc<dyn AnswerProvider>) -> Self {
        self.answers = Some(answers);
        self
    }

    /// Appraise the photos at `paths`. Image-load, service and parse
    /// failures are returned as-is; nothing is retried.
    pub async fn analyze(&self, paths: &[PathBuf], options: &AnalysisOptions) -> Result<ItemAnalysis> {
        let images: Arc<[EncodedImage]> = images::load_images(paths).await?.into();
        info!(
            target: "relic::analysis",
            images = images.len(),
            mode = ?options.mode,
            extended_thinking = options.extended_thinking,
            "analyzing photos"
        );

        match options.mode {
            AnalysisMode::SinglePass => self.single_pass(images, options).await,
            AnalysisMode::TwoStage => self.two_stage(images, options).await,
        }
    }

    async fn single_pass(&self, images: Arc<[EncodedImage]>, options: &AnalysisOptions) -> Result<ItemAnalysis> {
        let reply = self
            .service
            .complete(ReasoningRequest {
                tier: ModelTier::Deep,
                images,
                prompt: prompt::appraisal_prompt(options.extended_thinking, &options.target_platforms),
                max_tokens: DEEP_MAX_TOKENS,
                thinking_budget: options.thinking_budget(),
            })
            .await?;

        let mut analysis = parse::parse_analysis(&reply.text)?;
        if reply.thinking.is_some() {
            analysis.reasoning = reply.thinking;
        }
        Ok(analysis)
    }

    async fn two_stage(&self, images: Arc<[EncodedImage]>, options: &AnalysisOptions) -> Result<ItemAnalysis> {
        let triage = self.triage(Arc::clone(&images)).await?;
        debug!(
            target: "relic::analysis",
            category = %triage.category,
            era = %triage.era,
            condition = %triage.condition,
            "triage complete"
        );

        let reply = self
            .service
            .complete(ReasoningRequest {
                tier: ModelTier::Deep,
                images,
                prompt: prompt::elaboration_prompt(&triage, &options.target_platforms),
                max_tokens: DEEP_MAX_TOKENS,
                thinking_budget: options.thinking_budget(),
            })
            .await?;

        let mut analysis = parse::parse_analysis(&reply.text)?;
        if reply.thinking.is_some() {
            analysis.reasoning = reply.thinking;
        }
        Ok(analysis)
    }

    async fn triage(&self, images: Arc<[EncodedImage]>) -> Result<Triage> {
        let first = self
            .service
            .complete(ReasoningRequest {
                tier: ModelTier::Triage,
                images: Arc::clone(&images),
                prompt: prompt::triage_prompt(),
                max_tokens: TRIAGE_MAX_TOKENS,
                thinking_budget: None,
            })
            .await?;

        let questions = parse::extract_questions(&first.text);
        let Some(answers) = self.answers.as_ref().filter(|_| !questions.is_empty()) else {
            return Ok(parse::parse_triage(&first.text));
        };

        info!(target: "relic::analysis", questions = questions.len(), "triage needs operator input");
        let mut transcript = Vec::with_capacity(questions.len());
        for question in questions {
            let answer = answers.answer(&question).await?;
            transcript.push((question, answer));
        }

        let refined = self
            .service
            .complete(ReasoningRequest {
                tier: ModelTier::Triage,
                images,
                prompt: prompt::refined_triage_prompt(&transcript),
                max_tokens: TRIAGE_MAX_TOKENS,
                thinking_budget: None,
            })
            .await?;
        Ok(parse::parse_triage(&refined.text))
    }
}
