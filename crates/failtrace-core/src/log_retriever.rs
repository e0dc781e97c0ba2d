use crate::ci_services::RunLogSource;
use crate::log_bundle::LogBundle;
use crate::AnalysisError;

/// Downloads and decodes the log archive of one run.
pub async fn fetch_logs(source: &dyn RunLogSource, run_id: u64) -> Result<LogBundle, AnalysisError> {
    let bytes = source.run_log_archive(run_id).await?;
    let bundle = LogBundle::from_zip_bytes(&bytes)?;
    tracing::debug!(
        run_id,
        archive_bytes = bytes.len(),
        entries = bundle.entry_count(),
        "decoded run log archive"
    );
    Ok(bundle)
}
