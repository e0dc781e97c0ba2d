//! GitHub Actions REST helpers for failtrace.
//! This crate lists failed workflow runs, downloads run log archives, and
//! creates pull-request comments. Reads retry under a rate-limit aware policy.

pub mod github_api_client;
pub mod retry_policy;
pub mod workflow_runs;

pub use github_api_client::{
    GithubApiClient, GithubApiClientConfig, GithubApiError, DEFAULT_GITHUB_API_BASE,
    FAILED_RUNS_PAGE_SIZE,
};
pub use retry_policy::{GithubRetryPolicy, DEFAULT_MAX_RETRY_DELAY_MS};
pub use workflow_runs::{PullRequestRef, RepoRef, WorkflowRun, WorkflowRunsPage};
