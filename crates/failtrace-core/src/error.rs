use failtrace_ai::FailtraceAiError;
use failtrace_github::GithubApiError;
use thiserror::Error;

use crate::log_bundle::LogArchiveError;

/// Failure taxonomy for one analysis pass.
///
/// `Transport` from the initial run listing aborts the pass. Inside a run,
/// `Transport` and `Archive` become an error line in that run's section.
/// `Model` never leaves the analysis engine; it is rendered as result text.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(#[from] GithubApiError),
    #[error("archive error: {0}")]
    Archive(#[from] LogArchiveError),
    #[error("model error: {0}")]
    Model(#[from] FailtraceAiError),
}

impl AnalysisError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
