use clap::ValueEnum;
use failtrace_core::ReportFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliReportFormat {
    Markdown,
    Json,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(value: CliReportFormat) -> Self {
        match value {
            CliReportFormat::Markdown => Self::Markdown,
            CliReportFormat::Json => Self::Json,
        }
    }
}
