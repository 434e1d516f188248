pub mod gemini;
pub mod matcher;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AiConfig;
use crate::images::services::InlineImage;

/// Shown to users whenever an AI-backed feature is invoked without a
/// configured credential.
pub const DISABLED_MESSAGE: &str = "AI features are disabled. Please configure your API key.";

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("no AI API key is configured")]
    Disabled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Response(String),
}

/// The external judgment service: pairwise same-person verdicts and
/// free-text generation. Everything the AI backend is used for goes through
/// this trait.
#[async_trait]
pub trait FaceJudge: Send + Sync {
    /// Is the person in `a` the exact same person as in `b`?
    async fn same_person(&self, a: &InlineImage, b: &InlineImage) -> Result<bool, JudgeError>;
    /// One-shot text generation for attendance summaries.
    async fn summarize(&self, prompt: &str) -> Result<String, JudgeError>;
}

/// Stand-in used when no credential is configured. Every judgment fails
/// closed; callers surface [`DISABLED_MESSAGE`].
pub struct DisabledJudge;

#[async_trait]
impl FaceJudge for DisabledJudge {
    async fn same_person(&self, _a: &InlineImage, _b: &InlineImage) -> Result<bool, JudgeError> {
        Err(JudgeError::Disabled)
    }

    async fn summarize(&self, _prompt: &str) -> Result<String, JudgeError> {
        Err(JudgeError::Disabled)
    }
}

/// Pick the judge implementation for the configured credentials.
pub fn from_config(config: &AiConfig) -> anyhow::Result<Arc<dyn FaceJudge>> {
    match &config.api_key {
        Some(key) => Ok(Arc::new(gemini::GeminiJudge::new(
            key.clone(),
            config.model.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            tracing::warn!("AI API key not found; verification and summaries are disabled");
            Ok(Arc::new(DisabledJudge))
        }
    }
}
