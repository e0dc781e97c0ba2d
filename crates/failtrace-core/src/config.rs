pub use failtrace_ai::{DEFAULT_GOOGLE_API_BASE, DEFAULT_GOOGLE_MODEL};
pub use failtrace_github::DEFAULT_GITHUB_API_BASE;

use crate::context_extractor::ContextExtractorConfig;
use crate::AnalysisError;

pub const DEFAULT_RUN_LIMIT: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_GITHUB_RETRY_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_MODEL_MAX_RETRIES: usize = 2;
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// Inputs of one analysis pass. Not modified once the pass starts.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub owner: String,
    pub repo: String,
    pub github_token: String,
    pub model_api_key: String,
    pub post_to_pr: bool,
    pub limit: usize,
    pub model: String,
    pub github_api_base: String,
    pub google_api_base: String,
    pub request_timeout_ms: u64,
    pub github_retry_max_attempts: usize,
    pub model_max_retries: usize,
    pub max_concurrency: usize,
    pub extractor: ContextExtractorConfig,
}

impl AnalysisConfig {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        github_token: impl Into<String>,
        model_api_key: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            github_token: github_token.into(),
            model_api_key: model_api_key.into(),
            post_to_pr: false,
            limit: DEFAULT_RUN_LIMIT,
            model: DEFAULT_GOOGLE_MODEL.to_string(),
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            google_api_base: DEFAULT_GOOGLE_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            github_retry_max_attempts: DEFAULT_GITHUB_RETRY_MAX_ATTEMPTS,
            model_max_retries: DEFAULT_MODEL_MAX_RETRIES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            extractor: ContextExtractorConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let required = [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("github token", &self.github_token),
            ("gemini api key", &self.model_api_key),
        ];
        let missing = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(AnalysisError::Config(format!(
                "missing input: {}",
                missing.join(", ")
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AnalysisError::Config("model name cannot be empty".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(AnalysisError::Config(
                "max concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
