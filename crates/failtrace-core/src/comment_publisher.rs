use std::sync::Arc;

use crate::analysis_engine::AnalysisResult;
use crate::ci_services::PullRequestCommenter;
use crate::run_fetcher::RunSummary;

/// Status the comment service returns when a comment was created.
pub const COMMENT_CREATED_STATUS: u16 = 201;

pub fn render_failure_comment(run: &RunSummary, analysis: &AnalysisResult) -> String {
    format!(
        "🚨 **CI Failure Analysis (Workflow #{})**\n\n🔗 [View Workflow Logs]({})\n\n{}",
        run.run_number,
        run.html_url,
        analysis.text()
    )
}

#[derive(Clone)]
pub struct CommentPublisher {
    commenter: Arc<dyn PullRequestCommenter>,
}

impl CommentPublisher {
    pub fn new(commenter: Arc<dyn PullRequestCommenter>) -> Self {
        Self { commenter }
    }

    /// Single attempt; `true` only when the service reports creation.
    pub async fn publish(&self, pr_number: u64, body: &str) -> bool {
        match self.commenter.post_comment(pr_number, body).await {
            Ok(COMMENT_CREATED_STATUS) => true,
            Ok(status) => {
                tracing::warn!(pr_number, status, "comment was not created");
                false
            }
            Err(error) => {
                tracing::warn!(pr_number, %error, "comment request failed");
                false
            }
        }
    }

    /// Posts the analysis to the run's first pull request. Returns the PR
    /// number on success, `None` when there is no PR or the post failed.
    pub async fn publish_for_run(&self, run: &RunSummary, analysis: &AnalysisResult) -> Option<u64> {
        let pr_number = run.first_pull_request()?;
        let body = render_failure_comment(run, analysis);
        self.publish(pr_number, &body).await.then_some(pr_number)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use failtrace_github::GithubApiError;

    use super::{render_failure_comment, CommentPublisher};
    use crate::analysis_engine::AnalysisResult;
    use crate::ci_services::PullRequestCommenter;
    use crate::run_fetcher::RunSummary;
    use crate::AnalysisError;

    struct ScriptedCommenter {
        status: Option<u16>,
        posted: Mutex<Vec<(u64, String)>>,
    }

    impl ScriptedCommenter {
        fn with_status(status: Option<u16>) -> Arc<Self> {
            Arc::new(Self {
                status,
                posted: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PullRequestCommenter for ScriptedCommenter {
        async fn post_comment(&self, pr_number: u64, body: &str) -> Result<u16, AnalysisError> {
            self.posted
                .lock()
                .expect("posted lock")
                .push((pr_number, body.to_string()));
            self.status.ok_or_else(|| {
                GithubApiError::Config("connection reset".to_string()).into()
            })
        }
    }

    fn run_with_prs(pull_requests: Vec<u64>) -> RunSummary {
        RunSummary {
            id: 77,
            run_number: 12,
            html_url: "https://github.com/octo/widgets/actions/runs/77".to_string(),
            pull_requests,
        }
    }

    #[test]
    fn unit_comment_body_links_run_and_embeds_analysis() {
        let body = render_failure_comment(
            &run_with_prs(vec![3]),
            &AnalysisResult::from_model_text("Main Error: x"),
        );
        assert_eq!(
            body,
            "🚨 **CI Failure Analysis (Workflow #12)**\n\n🔗 [View Workflow Logs](https://github.com/octo/widgets/actions/runs/77)\n\nMain Error: x"
        );
    }

    #[tokio::test]
    async fn functional_publish_succeeds_only_on_created_status() {
        let created = CommentPublisher::new(ScriptedCommenter::with_status(Some(201)));
        assert!(created.publish(3, "body").await);

        let ok_but_not_created = CommentPublisher::new(ScriptedCommenter::with_status(Some(200)));
        assert!(!ok_but_not_created.publish(3, "body").await);

        let forbidden = CommentPublisher::new(ScriptedCommenter::with_status(Some(403)));
        assert!(!forbidden.publish(3, "body").await);

        let transport = CommentPublisher::new(ScriptedCommenter::with_status(None));
        assert!(!transport.publish(3, "body").await);
    }

    #[tokio::test]
    async fn functional_publish_for_run_targets_first_pull_request_only() {
        let commenter = ScriptedCommenter::with_status(Some(201));
        let publisher = CommentPublisher::new(commenter.clone());

        let posted = publisher
            .publish_for_run(
                &run_with_prs(vec![8, 9]),
                &AnalysisResult::from_model_text("analysis"),
            )
            .await;

        assert_eq!(posted, Some(8));
        let calls = commenter.posted.lock().expect("posted lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 8);
        assert!(calls[0].1.ends_with("analysis"));
    }

    #[tokio::test]
    async fn unit_publish_for_run_without_pull_request_is_a_no_op() {
        let commenter = ScriptedCommenter::with_status(Some(201));
        let publisher = CommentPublisher::new(commenter.clone());

        let posted = publisher
            .publish_for_run(&run_with_prs(Vec::new()), &AnalysisResult::from_model_text("a"))
            .await;

        assert_eq!(posted, None);
        assert!(commenter.posted.lock().expect("posted lock").is_empty());
    }
}
