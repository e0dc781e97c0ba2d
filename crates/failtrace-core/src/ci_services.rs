//! Remote collaborators of the analysis pipeline and their GitHub bindings.

use async_trait::async_trait;
use failtrace_github::GithubApiClient;

use crate::run_fetcher::RunSummary;
use crate::AnalysisError;

#[async_trait]
/// Paginated listing of failed runs, oldest-stable ordering assumed.
pub trait FailedRunSource: Send + Sync {
    async fn failed_runs_page(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<RunSummary>, AnalysisError>;
}

#[async_trait]
pub trait RunLogSource: Send + Sync {
    /// Compressed log archive for one run.
    async fn run_log_archive(&self, run_id: u64) -> Result<Vec<u8>, AnalysisError>;
}

#[async_trait]
pub trait PullRequestCommenter: Send + Sync {
    /// Returns the HTTP status reported by the comment service.
    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<u16, AnalysisError>;
}

#[async_trait]
impl FailedRunSource for GithubApiClient {
    async fn failed_runs_page(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<RunSummary>, AnalysisError> {
        let runs = self.list_failed_runs_page(page, per_page).await?;
        Ok(runs.into_iter().map(RunSummary::from).collect())
    }
}

#[async_trait]
impl RunLogSource for GithubApiClient {
    async fn run_log_archive(&self, run_id: u64) -> Result<Vec<u8>, AnalysisError> {
        Ok(self.download_run_logs(run_id).await?)
    }
}

#[async_trait]
impl PullRequestCommenter for GithubApiClient {
    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<u16, AnalysisError> {
        Ok(self.create_issue_comment(pr_number, body).await?)
    }
}
