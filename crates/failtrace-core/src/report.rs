use serde::Serialize;

use crate::analysis_engine::AnalysisResult;
use crate::run_fetcher::RunSummary;

pub const NO_FAILURES_MESSAGE: &str = "✅ No failed workflows found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

/// Outcome of one run. Exactly one section exists per processed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSection {
    pub run: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_posted_to: Option<u64>,
}

impl RunSection {
    pub fn analyzed(run: RunSummary, analysis: AnalysisResult, comment_posted_to: Option<u64>) -> Self {
        Self {
            run,
            analysis: Some(analysis),
            error: None,
            comment_posted_to,
        }
    }

    pub fn failed(run: RunSummary, error: impl Into<String>) -> Self {
        Self {
            run,
            analysis: None,
            error: Some(error.into()),
            comment_posted_to: None,
        }
    }

    pub fn render_markdown(&self) -> String {
        let mut out = format!(
            "---\n### 🔎 Workflow #{} ([View Logs]({}))\n",
            self.run.run_number, self.run.html_url
        );
        if let Some(analysis) = &self.analysis {
            out.push_str(analysis.text());
            out.push('\n');
        }
        if let Some(pr_number) = self.comment_posted_to {
            out.push_str(&format!("✅ Comment posted to PR #{pr_number}\n"));
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("❌ Error: {error}\n"));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub runs_analyzed: usize,
    pub runs_failed: usize,
    pub model_failures: usize,
    pub comments_posted: usize,
}

/// Append-only accumulator for one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    sections: Vec<RunSection>,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    summary: ReportSummary,
    runs: &'a [RunSection],
}

impl Report {
    pub fn push_section(&mut self, section: RunSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> &[RunSection] {
        &self.sections
    }

    pub fn no_failures(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        self.sections
            .iter()
            .fold(ReportSummary::default(), |mut summary, section| {
                match &section.analysis {
                    Some(analysis) => {
                        summary.runs_analyzed += 1;
                        if analysis.model_failed() {
                            summary.model_failures += 1;
                        }
                    }
                    None => summary.runs_failed += 1,
                }
                if section.comment_posted_to.is_some() {
                    summary.comments_posted += 1;
                }
                summary
            })
    }

    pub fn render_markdown(&self) -> String {
        if self.no_failures() {
            return NO_FAILURES_MESSAGE.to_string();
        }
        self.sections
            .iter()
            .map(RunSection::render_markdown)
            .collect()
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ReportDocument {
            summary: self.summary(),
            runs: &self.sections,
        })
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Markdown => Ok(self.render_markdown()),
            ReportFormat::Json => self.render_json(),
        }
    }
}
