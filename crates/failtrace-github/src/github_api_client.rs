use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::retry_policy::GithubRetryPolicy;
use crate::workflow_runs::{RepoRef, WorkflowRun, WorkflowRunsPage};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
pub const FAILED_RUNS_PAGE_SIZE: usize = 100;

const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Error)]
pub enum GithubApiError {
    #[error("invalid github client configuration: {0}")]
    Config(String),
    #[error("github api {operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("github api {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode github {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct GithubApiClientConfig {
    pub api_base: String,
    pub token: String,
    pub repo: RepoRef,
    pub request_timeout_ms: u64,
    pub retry: GithubRetryPolicy,
}

impl GithubApiClientConfig {
    pub fn new(repo: RepoRef, token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: token.into(),
            repo,
            request_timeout_ms: 30_000,
            retry: GithubRetryPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
    retry: GithubRetryPolicy,
}

impl GithubApiClient {
    pub fn new(config: GithubApiClientConfig) -> Result<Self, GithubApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("failtrace-ci-analyzer"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        let mut auth_value = reqwest::header::HeaderValue::from_str(&auth_header)
            .map_err(|_| GithubApiError::Config("invalid github authorization header".into()))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| {
                GithubApiError::Config(format!("failed to create github api client: {error}"))
            })?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: config.repo,
            retry: GithubRetryPolicy {
                max_attempts: config.retry.max_attempts.max(1),
                base_delay_ms: config.retry.base_delay_ms.max(1),
                max_delay_ms: config.retry.max_delay_ms,
            },
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.repo.owner, self.repo.name, suffix
        )
    }

    /// One page of completed runs whose conclusion is `failure`.
    pub async fn list_failed_runs_page(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<WorkflowRun>, GithubApiError> {
        let url = self.repo_url("actions/runs");
        let page_value = page.to_string();
        let per_page_value = per_page.to_string();
        let parsed: WorkflowRunsPage = self
            .request_json("list failed workflow runs", || {
                self.http.get(&url).query(&[
                    ("status", "failure"),
                    ("per_page", per_page_value.as_str()),
                    ("page", page_value.as_str()),
                ])
            })
            .await?;
        tracing::debug!(
            repo = %self.repo.full_name(),
            page,
            returned = parsed.workflow_runs.len(),
            total = parsed.total_count,
            "listed failed workflow runs page"
        );
        Ok(parsed.workflow_runs)
    }

    /// Raw zip archive bytes of every job log for a run.
    pub async fn download_run_logs(&self, run_id: u64) -> Result<Vec<u8>, GithubApiError> {
        let url = self.repo_url(&format!("actions/runs/{run_id}/logs"));
        let operation = "download workflow run logs";
        let response = self.send_with_retry(operation, || self.http.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| GithubApiError::Decode { operation, source })?;
        Ok(bytes.to_vec())
    }

    /// Posts a comment on an issue or pull request and returns the HTTP status.
    /// Sent exactly once.
    pub async fn create_issue_comment(
        &self,
        issue_number: u64,
        body: &str,
    ) -> Result<u16, GithubApiError> {
        let url = self.repo_url(&format!("issues/{issue_number}/comments"));
        let response = self
            .http
            .post(url)
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|source| GithubApiError::Request {
                operation: "create issue comment",
                source,
            })?;
        Ok(response.status().as_u16())
    }

    async fn request_json<T, F>(
        &self,
        operation: &'static str,
        request_builder: F,
    ) -> Result<T, GithubApiError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, request_builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| GithubApiError::Decode { operation, source })
    }

    async fn send_with_retry<F>(
        &self,
        operation: &'static str,
        mut request_builder: F,
    ) -> Result<reqwest::Response, GithubApiError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header("x-failtrace-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let delay =
                        self.retry
                            .status_delay(attempt, status.as_u16(), response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if let Some(delay) = delay {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(GithubApiError::Status {
                        operation,
                        status: status.as_u16(),
                        body: truncate_error_body(&body),
                    });
                }
                Err(error) => {
                    if let Some(delay) = self.retry.transport_delay(attempt, &error) {
                        tracing::debug!(operation, %error, attempt, "retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(GithubApiError::Request {
                        operation,
                        source: error,
                    });
                }
            }
        }
    }
}

fn truncate_error_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_MAX_CHARS) {
        None => body.to_string(),
        Some((cut, _)) => format!("{}...", &body[..cut]),
    }
}
