use std::io::{Cursor, Write};

use failtrace_core::{run_analysis, AnalysisConfig, ReportFormat};
use httpmock::prelude::*;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;

fn log_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, text) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        writer.write_all(text.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

fn workflow_run(id: u64, run_number: u64, pull_requests: &[u64]) -> Value {
    json!({
        "id": id,
        "run_number": run_number,
        "html_url": format!("https://github.com/octo/widgets/actions/runs/{id}"),
        "status": "completed",
        "conclusion": "failure",
        "pull_requests": pull_requests
            .iter()
            .map(|number| json!({ "number": number }))
            .collect::<Vec<_>>(),
    })
}

fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 120,
            "candidatesTokenCount": 18,
            "totalTokenCount": 138
        }
    })
}

fn config_for(github: &MockServer, gemini: &MockServer) -> AnalysisConfig {
    let mut config = AnalysisConfig::new("octo", "widgets", "ghp_integration", "gemini-integration");
    config.github_api_base = github.base_url();
    config.google_api_base = gemini.base_url();
    config.request_timeout_ms = 5_000;
    config
}

#[tokio::test]
async fn integration_failed_runs_are_analyzed_commented_and_isolated() {
    let github = MockServer::start();
    let gemini = MockServer::start();

    let first_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("status", "failure")
            .query_param("per_page", "100")
            .query_param("page", "1");
        then.status(200).json_body(json!({
            "total_count": 2,
            "workflow_runs": [workflow_run(901, 31, &[42, 43]), workflow_run(902, 32, &[])]
        }));
    });
    let second_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("page", "2");
        then.status(200)
            .json_body(json!({ "total_count": 2, "workflow_runs": [] }));
    });
    let logs = github.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/actions/runs/901/logs");
        then.status(200)
            .header("content-type", "application/zip")
            .body(log_archive(&[
                ("build/1_Set up job.txt", "Runner image ubuntu-24.04\n"),
                (
                    "build/2_cargo build.txt",
                    "Compiling widgets v0.3.0\nerror[E0308]: mismatched types\n",
                ),
            ]));
    });
    let missing_logs = github.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/actions/runs/902/logs");
        then.status(404).body("{\"message\":\"Not Found\"}");
    });
    let comment = github.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/widgets/issues/42/comments")
            .body_includes("CI Failure Analysis (Workflow #31)")
            .body_includes("Main Error: mismatched types");
        then.status(201).json_body(json!({ "id": 7001 }));
    });
    let generate = gemini.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-1.5-flash:generateContent")
            .query_param("key", "gemini-integration")
            .body_includes("error[E0308]: mismatched types")
            .body_includes("Confidence Level");
        then.status(200)
            .json_body(gemini_reply("Main Error: mismatched types\n"));
    });

    let mut config = config_for(&github, &gemini);
    config.post_to_pr = true;
    let report = run_analysis(&config).await.expect("analysis pass");

    first_page.assert();
    second_page.assert();
    logs.assert();
    missing_logs.assert();
    comment.assert_calls(1);
    generate.assert_calls(1);

    let markdown = report.render_markdown();
    assert!(markdown.starts_with(
        "---\n### 🔎 Workflow #31 ([View Logs](https://github.com/octo/widgets/actions/runs/901))\n\
         Main Error: mismatched types\n\
         ✅ Comment posted to PR #42\n\
         ---\n### 🔎 Workflow #32 ([View Logs](https://github.com/octo/widgets/actions/runs/902))\n\
         ❌ Error: transport error: "
    ));
    assert!(markdown.contains("status 404"));

    let json_report: Value =
        serde_json::from_str(&report.render(ReportFormat::Json).expect("json")).expect("parse");
    assert_eq!(json_report["summary"]["runs_analyzed"], 1);
    assert_eq!(json_report["summary"]["runs_failed"], 1);
    assert_eq!(json_report["summary"]["comments_posted"], 1);
}

#[tokio::test]
async fn integration_model_rejection_is_reported_as_text_not_failure() {
    let github = MockServer::start();
    let gemini = MockServer::start();

    let first_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("page", "1");
        then.status(200)
            .json_body(json!({ "workflow_runs": [workflow_run(950, 5, &[12])] }));
    });
    let second_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("page", "2");
        then.status(200).json_body(json!({ "workflow_runs": [] }));
    });
    github.mock(|when, then| {
        when.method(GET).path("/repos/octo/widgets/actions/runs/950/logs");
        then.status(200)
            .body(log_archive(&[("test/1_run.txt", "test suite FAILED\n")]));
    });
    let comment = github.mock(|when, then| {
        when.method(POST).path("/repos/octo/widgets/issues/12/comments");
        then.status(201);
    });
    let generate = gemini.mock(|when, then| {
        when.method(POST)
            .path("/models/gemini-1.5-flash:generateContent");
        then.status(400)
            .json_body(json!({ "error": { "message": "API key not valid" } }));
    });

    let report = run_analysis(&config_for(&github, &gemini))
        .await
        .expect("analysis pass");

    first_page.assert();
    second_page.assert();
    generate.assert_calls(1);
    comment.assert_calls(0);
    assert_eq!(report.sections().len(), 1);
    let section = &report.sections()[0];
    let analysis = section.analysis.as_ref().expect("analysis text");
    assert!(analysis.model_failed());
    assert!(analysis.text().starts_with("⚠️ Gemini error:"));
    assert!(analysis.text().contains("API key not valid"));
    assert!(section.error.is_none());
    assert_eq!(report.summary().model_failures, 1);
}

#[tokio::test]
async fn integration_limit_stops_paging_once_enough_runs_are_collected() {
    let github = MockServer::start();
    let gemini = MockServer::start();

    let runs = (0..12)
        .map(|index| workflow_run(1_000 + index, 100 + index, &[]))
        .collect::<Vec<_>>();
    let first_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("page", "1");
        then.status(200).json_body(json!({ "workflow_runs": runs }));
    });
    let second_page = github.mock(|when, then| {
        when.method(GET)
            .path("/repos/octo/widgets/actions/runs")
            .query_param("page", "2");
        then.status(200).json_body(json!({ "workflow_runs": [] }));
    });
    let logs = github.mock(|when, then| {
        when.method(GET)
            .path_includes("/logs");
        then.status(200)
            .body(log_archive(&[("job/1_step.txt", "fatal: remote end hung up\n")]));
    });
    let generate = gemini.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(gemini_reply("Main Error: network"));
    });

    let mut config = config_for(&github, &gemini);
    config.limit = 5;
    config.max_concurrency = 3;
    let report = run_analysis(&config).await.expect("analysis pass");

    first_page.assert();
    second_page.assert_calls(0);
    logs.assert_calls(5);
    generate.assert_calls(5);
    assert_eq!(
        report
            .sections()
            .iter()
            .map(|section| section.run.run_number)
            .collect::<Vec<_>>(),
        vec![100, 101, 102, 103, 104]
    );
}
