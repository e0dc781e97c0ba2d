mod bootstrap_helpers;
mod cli_args;
mod cli_types;

use anyhow::{bail, Context, Result};
use clap::Parser;
use failtrace_core::{AnalysisError, AnalysisPipeline, ReportFormat};

use crate::bootstrap_helpers::{init_tracing, load_dotenv};
use crate::cli_args::Cli;

async fn run_cli(cli: Cli) -> Result<()> {
    let format = ReportFormat::from(cli.format);
    let config = cli.to_analysis_config();
    if let Err(AnalysisError::Config(reason)) = config.validate() {
        bail!("❌ {reason}");
    }

    tracing::info!(
        repo = %format!("{}/{}", config.owner, config.repo),
        limit = config.limit,
        post_to_pr = config.post_to_pr,
        model = %config.model,
        "starting ci failure analysis"
    );
    let pipeline =
        AnalysisPipeline::from_config(&config).context("failed to initialize api clients")?;
    let report = pipeline
        .run()
        .await
        .context("❌ Error fetching failed workflow runs")?;
    let rendered = report
        .render(format)
        .context("failed to render analysis report")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_error = load_dotenv();
    init_tracing();
    if let Some(error) = dotenv_error {
        tracing::warn!(%error, "failed to load .env file");
    }
    let cli = Cli::parse();
    run_cli(cli).await
}
