//! CI failure analysis pipeline.
//!
//! Lists failed GitHub Actions runs, decodes their log archives, extracts the
//! lines most likely to explain the failure, asks a language model for a
//! root-cause summary, and optionally comments the result on the run's pull
//! request. Each pass yields an append-only [`Report`].

pub mod analysis_engine;
pub mod ci_services;
pub mod comment_publisher;
pub mod config;
pub mod context_extractor;
mod error;
pub mod log_bundle;
pub mod log_retriever;
pub mod orchestrator;
pub mod report;
pub mod run_fetcher;

pub use analysis_engine::{render_analysis_prompt, AnalysisEngine, AnalysisResult, MODEL_ERROR_PREFIX};
pub use ci_services::{FailedRunSource, PullRequestCommenter, RunLogSource};
pub use comment_publisher::{render_failure_comment, CommentPublisher};
pub use config::{AnalysisConfig, DEFAULT_RUN_LIMIT};
pub use context_extractor::{extract_failure_context, ContextExtractorConfig, TAIL_MARKER};
pub use error::AnalysisError;
pub use log_bundle::{LogArchiveError, LogBundle};
pub use log_retriever::fetch_logs;
pub use orchestrator::{run_analysis, run_analysis_text, AnalysisPipeline};
pub use report::{Report, ReportFormat, ReportSummary, RunSection, NO_FAILURES_MESSAGE};
pub use run_fetcher::{fetch_failed_runs, RunSummary};
