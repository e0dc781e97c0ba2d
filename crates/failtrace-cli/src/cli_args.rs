use clap::Parser;
use failtrace_core::config::{
    DEFAULT_GITHUB_API_BASE, DEFAULT_GOOGLE_API_BASE, DEFAULT_GOOGLE_MODEL,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_MODEL_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RUN_LIMIT,
};
use failtrace_core::context_extractor::{
    DEFAULT_CONTEXT_LINES, DEFAULT_FAILURE_KEYWORDS, DEFAULT_MAX_CHARS,
};
use failtrace_core::{AnalysisConfig, ContextExtractorConfig};
use failtrace_github::RepoRef;

use crate::cli_types::CliReportFormat;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "failtrace",
    about = "Explain failed GitHub Actions runs with Gemini and optionally comment on the PR",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "FAILTRACE_OWNER",
        help = "Repository owner (user or organization)"
    )]
    pub owner: Option<String>,

    #[arg(
        long,
        env = "FAILTRACE_REPO",
        help = "Repository name, or owner/name when --owner is omitted"
    )]
    pub repo: Option<String>,

    #[arg(
        long = "github-token",
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "GitHub token with actions:read (and issues:write for --post-to-pr)"
    )]
    pub github_token: Option<String>,

    #[arg(
        long = "gemini-api-key",
        env = "GEMINI_API_KEY",
        hide_env_values = true,
        help = "Google Generative Language API key"
    )]
    pub gemini_api_key: Option<String>,

    #[arg(
        long = "post-to-pr",
        env = "FAILTRACE_POST_TO_PR",
        default_value_t = false,
        help = "Comment each analysis on the first pull request of its run"
    )]
    pub post_to_pr: bool,

    #[arg(
        long,
        env = "FAILTRACE_LIMIT",
        default_value_t = DEFAULT_RUN_LIMIT,
        value_parser = parse_positive_usize,
        help = "Maximum number of failed runs to analyze"
    )]
    pub limit: usize,

    #[arg(
        long,
        env = "FAILTRACE_MODEL",
        default_value = DEFAULT_GOOGLE_MODEL,
        help = "Gemini model name"
    )]
    pub model: String,

    #[arg(
        long = "github-api-base",
        env = "FAILTRACE_GITHUB_API_BASE",
        default_value = DEFAULT_GITHUB_API_BASE,
        help = "Base URL for the GitHub REST API"
    )]
    pub github_api_base: String,

    #[arg(
        long = "google-api-base",
        env = "FAILTRACE_GOOGLE_API_BASE",
        default_value = DEFAULT_GOOGLE_API_BASE,
        help = "Base URL for the Gemini API"
    )]
    pub google_api_base: String,

    #[arg(
        long = "request-timeout-ms",
        env = "FAILTRACE_REQUEST_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "HTTP request timeout in milliseconds for GitHub and Gemini calls"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "max-retries",
        env = "FAILTRACE_MAX_RETRIES",
        default_value_t = DEFAULT_MODEL_MAX_RETRIES,
        help = "Retries for transient Gemini failures"
    )]
    pub max_retries: usize,

    #[arg(
        long = "max-concurrency",
        env = "FAILTRACE_MAX_CONCURRENCY",
        default_value_t = DEFAULT_MAX_CONCURRENCY,
        value_parser = parse_positive_usize,
        help = "Runs analyzed at once; report order is unchanged"
    )]
    pub max_concurrency: usize,

    #[arg(
        long = "max-chars",
        env = "FAILTRACE_MAX_CHARS",
        default_value_t = DEFAULT_MAX_CHARS,
        value_parser = parse_positive_usize,
        help = "Character budget of the log excerpt sent to the model"
    )]
    pub max_chars: usize,

    #[arg(
        long = "context-lines",
        env = "FAILTRACE_CONTEXT_LINES",
        default_value_t = DEFAULT_CONTEXT_LINES,
        help = "Lines kept on each side of a keyword hit"
    )]
    pub context_lines: usize,

    #[arg(
        long = "keyword",
        value_delimiter = ',',
        help = "Failure keyword (repeatable or comma-separated); replaces the default set"
    )]
    pub keywords: Vec<String>,

    #[arg(
        long,
        value_enum,
        default_value = "markdown",
        help = "Report output format"
    )]
    pub format: CliReportFormat,
}

impl Cli {
    /// Resolves `--repo owner/name` when `--owner` is absent.
    fn repository(&self) -> (String, String) {
        let owner = self.owner.clone().unwrap_or_default();
        let repo = self.repo.clone().unwrap_or_default();
        if owner.trim().is_empty() {
            if let Some(parsed) = RepoRef::parse(&repo) {
                return (parsed.owner, parsed.name);
            }
        }
        (owner, repo)
    }

    pub fn to_analysis_config(&self) -> AnalysisConfig {
        let (owner, repo) = self.repository();
        let mut config = AnalysisConfig::new(
            owner,
            repo,
            self.github_token.clone().unwrap_or_default(),
            self.gemini_api_key.clone().unwrap_or_default(),
        );
        config.post_to_pr = self.post_to_pr;
        config.limit = self.limit;
        config.model = self.model.clone();
        config.github_api_base = self.github_api_base.clone();
        config.google_api_base = self.google_api_base.clone();
        config.request_timeout_ms = self.request_timeout_ms;
        config.model_max_retries = self.max_retries;
        config.max_concurrency = self.max_concurrency;

        let keywords = self
            .keywords
            .iter()
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect::<Vec<_>>();
        config.extractor = ContextExtractorConfig {
            max_chars: self.max_chars,
            context_lines: self.context_lines,
            keywords: if keywords.is_empty() {
                DEFAULT_FAILURE_KEYWORDS
                    .iter()
                    .map(|keyword| keyword.to_string())
                    .collect()
            } else {
                keywords
            },
        };
        config
    }
}
