use std::sync::Arc;

use failtrace_ai::{GoogleClient, GoogleConfig, ProviderRetryPolicy};
use failtrace_github::{GithubApiClient, GithubApiClientConfig, RepoRef};
use futures_util::stream::{self, StreamExt};

use crate::analysis_engine::{AnalysisEngine, AnalysisResult};
use crate::ci_services::{FailedRunSource, RunLogSource};
use crate::comment_publisher::CommentPublisher;
use crate::config::AnalysisConfig;
use crate::log_retriever::fetch_logs;
use crate::report::{Report, RunSection};
use crate::run_fetcher::{fetch_failed_runs, RunSummary};
use crate::AnalysisError;

/// Drives one pass: list failed runs, then analyze (and optionally comment
/// on) each run, producing one report section per run in fetch order.
pub struct AnalysisPipeline {
    runs: Arc<dyn FailedRunSource>,
    logs: Arc<dyn RunLogSource>,
    engine: AnalysisEngine,
    publisher: Option<CommentPublisher>,
    limit: usize,
    max_concurrency: usize,
}

impl AnalysisPipeline {
    pub fn new(
        runs: Arc<dyn FailedRunSource>,
        logs: Arc<dyn RunLogSource>,
        engine: AnalysisEngine,
        limit: usize,
    ) -> Self {
        Self {
            runs,
            logs,
            engine,
            publisher: None,
            limit,
            max_concurrency: 1,
        }
    }

    pub fn with_publisher(mut self, publisher: CommentPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Wires the GitHub and Gemini clients described by `config`.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;

        let mut github_config = GithubApiClientConfig::new(
            RepoRef::new(config.owner.trim(), config.repo.trim()),
            config.github_token.trim(),
        );
        github_config.api_base = config.github_api_base.clone();
        github_config.request_timeout_ms = config.request_timeout_ms;
        github_config.retry.max_attempts = config.github_retry_max_attempts.max(1);
        let github = Arc::new(GithubApiClient::new(github_config)?);

        let mut google_config = GoogleConfig::with_api_key(config.model_api_key.trim());
        google_config.api_base = config.google_api_base.clone();
        google_config.request_timeout_ms = config.request_timeout_ms;
        google_config.retry = ProviderRetryPolicy {
            max_retries: config.model_max_retries,
            ..ProviderRetryPolicy::default()
        };
        let google = Arc::new(GoogleClient::new(google_config)?);

        let engine = AnalysisEngine::new(google, config.model.trim(), config.extractor.clone());
        let pipeline = Self::new(github.clone(), github.clone(), engine, config.limit)
            .with_max_concurrency(config.max_concurrency);
        Ok(if config.post_to_pr {
            pipeline.with_publisher(CommentPublisher::new(github))
        } else {
            pipeline
        })
    }

    /// Fails only when the run listing fails; per-run errors land in the report.
    pub async fn run(&self) -> Result<Report, AnalysisError> {
        let runs = fetch_failed_runs(self.runs.as_ref(), self.limit).await?;
        let mut report = Report::default();
        if runs.is_empty() {
            tracing::info!("no failed workflow runs found");
            return Ok(report);
        }

        tracing::info!(
            runs = runs.len(),
            max_concurrency = self.max_concurrency,
            "analyzing failed workflow runs"
        );
        let sections = stream::iter(runs)
            .map(|run| self.process_run(run))
            .buffered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;
        for section in sections {
            report.push_section(section);
        }

        let summary = report.summary();
        tracing::info!(
            runs_analyzed = summary.runs_analyzed,
            runs_failed = summary.runs_failed,
            model_failures = summary.model_failures,
            comments_posted = summary.comments_posted,
            "analysis pass complete"
        );
        Ok(report)
    }

    /// Logs to analysis for one run, without side effects on the PR.
    pub async fn analyze_run(&self, run: &RunSummary) -> Result<AnalysisResult, AnalysisError> {
        let bundle = fetch_logs(self.logs.as_ref(), run.id).await?;
        Ok(self.engine.analyze(bundle.as_str()).await)
    }

    async fn process_run(&self, run: RunSummary) -> RunSection {
        tracing::debug!(run_id = run.id, run_number = run.run_number, "analyzing run");
        match self.analyze_run(&run).await {
            Ok(analysis) => {
                let comment_posted_to = match &self.publisher {
                    Some(publisher) => publisher.publish_for_run(&run, &analysis).await,
                    None => None,
                };
                RunSection::analyzed(run, analysis, comment_posted_to)
            }
            Err(error) => {
                tracing::warn!(run_id = run.id, %error, "run analysis failed");
                RunSection::failed(run, error.to_string())
            }
        }
    }
}

pub async fn run_analysis(config: &AnalysisConfig) -> Result<Report, AnalysisError> {
    AnalysisPipeline::from_config(config)?.run().await
}

/// Text-in, text-out entry point: fatal errors are rendered as report text.
pub async fn run_analysis_text(
    owner: &str,
    repo: &str,
    github_token: &str,
    model_api_key: &str,
    post_to_pr: bool,
) -> String {
    let mut config = AnalysisConfig::new(owner, repo, github_token, model_api_key);
    config.post_to_pr = post_to_pr;
    match run_analysis(&config).await {
        Ok(report) => report.render_markdown(),
        Err(AnalysisError::Config(reason)) => format!("❌ {reason}"),
        Err(error) => format!("❌ Error fetching runs: {error}"),
    }
}
