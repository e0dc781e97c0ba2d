use std::sync::Arc;

use failtrace_ai::{ChatRequest, FailtraceAiError, LlmClient};
use serde::Serialize;

use crate::context_extractor::ContextExtractorConfig;
use crate::AnalysisError;

pub const MODEL_ERROR_PREFIX: &str = "⚠️ Gemini error:";

/// Model output for one run, or the marker text that replaced a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    text: String,
    model_failed: bool,
}

impl AnalysisResult {
    pub fn from_model_text(text: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            model_failed: false,
        }
    }

    pub fn from_model_error(error: &AnalysisError) -> Self {
        let reason = match error {
            AnalysisError::Model(inner) => inner.to_string(),
            other => other.to_string(),
        };
        Self {
            text: format!("{MODEL_ERROR_PREFIX} {reason}"),
            model_failed: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn model_failed(&self) -> bool {
        self.model_failed
    }
}

pub fn render_analysis_prompt(excerpt: &str) -> String {
    format!(
        "\nYou are a DevOps assistant. Analyze the CI/CD log below and respond with:\n\n\
         - ❌ **Main Error**\n\
         - 💡 **Suggested Fix**\n\
         - 📈 **Confidence Level** (high/medium/low)\n\n\
         Logs:\n{excerpt}\n"
    )
}

/// Excerpt, prompt, and model call for a single log.
#[derive(Clone)]
pub struct AnalysisEngine {
    client: Arc<dyn LlmClient>,
    model: String,
    extractor: ContextExtractorConfig,
}

impl AnalysisEngine {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        extractor: ContextExtractorConfig,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            extractor,
        }
    }

    /// Never fails: model errors come back as [`MODEL_ERROR_PREFIX`] text.
    pub async fn analyze(&self, log_text: &str) -> AnalysisResult {
        match self.complete(log_text).await {
            Ok(text) => AnalysisResult::from_model_text(&text),
            Err(error) => {
                tracing::warn!(model = %self.model, %error, "model analysis failed");
                AnalysisResult::from_model_error(&error)
            }
        }
    }

    async fn complete(&self, log_text: &str) -> Result<String, AnalysisError> {
        let excerpt = self.extractor.extract(log_text);
        tracing::debug!(
            log_chars = log_text.len(),
            excerpt_chars = excerpt.chars().count(),
            "extracted failure context"
        );
        let request = ChatRequest::single_prompt(&self.model, render_analysis_prompt(&excerpt));
        let response = self.client.complete(request).await?;
        let text = response.message.text_content();
        if text.trim().is_empty() {
            return Err(FailtraceAiError::InvalidResponse(
                "model returned no text".to_string(),
            )
            .into());
        }
        Ok(text)
    }
}
