use failtrace_github::{WorkflowRun, FAILED_RUNS_PAGE_SIZE};
use serde::{Deserialize, Serialize};

use crate::ci_services::FailedRunSource;
use crate::AnalysisError;

/// A failed run as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: u64,
    pub run_number: u64,
    pub html_url: String,
    pub pull_requests: Vec<u64>,
}

impl RunSummary {
    pub fn first_pull_request(&self) -> Option<u64> {
        self.pull_requests.first().copied()
    }
}

impl From<WorkflowRun> for RunSummary {
    fn from(run: WorkflowRun) -> Self {
        Self {
            id: run.id,
            run_number: run.run_number,
            html_url: run.html_url,
            pull_requests: run
                .pull_requests
                .into_iter()
                .map(|pull_request| pull_request.number)
                .collect(),
        }
    }
}

/// Collects up to `limit` failed runs, requesting pages 1, 2, ... until a page
/// comes back empty or enough runs have accumulated. Any page failure aborts
/// the whole fetch.
pub async fn fetch_failed_runs(
    source: &dyn FailedRunSource,
    limit: usize,
) -> Result<Vec<RunSummary>, AnalysisError> {
    let mut runs = Vec::new();
    let mut page = 1_u32;
    while runs.len() < limit {
        let chunk = source.failed_runs_page(page, FAILED_RUNS_PAGE_SIZE).await?;
        if chunk.is_empty() {
            break;
        }
        tracing::debug!(page, fetched = chunk.len(), "fetched failed runs page");
        runs.extend(chunk);
        page = page.saturating_add(1);
    }
    runs.truncate(limit);
    Ok(runs)
}
