//! Operator prompts for interactive two-stage analysis.

use async_trait::async_trait;
use dialoguer::Input;
use relic_core::{AnswerProvider, RelicError, Result};

/// Asks triage questions on the controlling terminal. A blank answer is
/// passed through as-is and the analysis carries on without it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAnswers;

#[async_trait]
impl AnswerProvider for TerminalAnswers {
    async fn answer(&self, question: &str) -> Result<String> {
        let prompt = question.to_string();
        tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
                .map_err(|err| RelicError::Internal(format!("prompt failed: {err}")))
        })
        .await
        .map_err(|err| RelicError::Internal(format!("prompt task failed: {err}")))?
    }
}
