use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{new_request_id, parse_retry_after_ms},
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, FailtraceAiError, LlmClient, Message,
    MessageRole, ProviderRetryPolicy,
};

pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GOOGLE_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
/// Public struct `GoogleConfig` used across failtrace components.
pub struct GoogleConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub retry: ProviderRetryPolicy,
}

impl GoogleConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GOOGLE_API_BASE.to_string(),
            api_key: api_key.into(),
            request_timeout_ms: 120_000,
            retry: ProviderRetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
/// Gemini `generateContent` client.
pub struct GoogleClient {
    client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Result<Self, FailtraceAiError> {
        if config.api_key.trim().is_empty() {
            return Err(FailtraceAiError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, config })
    }

    fn generate_content_url(&self, model: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", model);
        }
        format!("{base}/models/{model}:generateContent")
    }
}

#[async_trait]
impl LlmClient for GoogleClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, FailtraceAiError> {
        let body = build_generate_content_body(&request);
        let url = self.generate_content_url(&request.model);
        let policy = self.config.retry;

        for attempt in 0..=policy.max_retries {
            let response = self
                .client
                .post(&url)
                .header("x-failtrace-request-id", new_request_id())
                .header("x-failtrace-retry-attempt", attempt.to_string())
                .query(&[("key", self.config.api_key.as_str())])
                .json(&body)
                .send()
                .await;
            let next_delay_ms = |retry_after_ms: Option<u64>| {
                (attempt < policy.max_retries).then(|| policy.delay_ms(attempt, retry_after_ms))
            };

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let raw = response.text().await?;
                        return parse_generate_content_response(&raw);
                    }

                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let raw = response.text().await?;
                    if ProviderRetryPolicy::should_retry_status(status.as_u16()) {
                        if let Some(delay_ms) = next_delay_ms(retry_after_ms) {
                            tracing::debug!(
                                status = status.as_u16(),
                                attempt,
                                delay_ms,
                                "gemini returned retryable status"
                            );
                            sleep(Duration::from_millis(delay_ms)).await;
                            continue;
                        }
                    }
                    return Err(FailtraceAiError::HttpStatus {
                        status: status.as_u16(),
                        body: raw,
                    });
                }
                Err(error) => {
                    if ProviderRetryPolicy::should_retry_transport(&error) {
                        if let Some(delay_ms) = next_delay_ms(None) {
                            tracing::debug!(%error, attempt, delay_ms, "gemini transport error");
                            sleep(Duration::from_millis(delay_ms)).await;
                            continue;
                        }
                    }
                    return Err(FailtraceAiError::Http(error));
                }
            }
        }

        Err(FailtraceAiError::InvalidResponse(
            "request retry loop terminated unexpectedly".to_string(),
        ))
    }
}

fn build_generate_content_body(request: &ChatRequest) -> Value {
    let contents = request
        .messages
        .iter()
        .filter_map(|message| {
            let role = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            let parts = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } if !text.trim().is_empty() => {
                        Some(json!({ "text": text }))
                    }
                    ContentBlock::Text { .. } => None,
                })
                .collect::<Vec<_>>();
            (!parts.is_empty()).then(|| json!({ "role": role, "parts": parts }))
        })
        .collect::<Vec<_>>();

    json!({ "contents": contents })
}

fn parse_generate_content_response(raw: &str) -> Result<ChatResponse, FailtraceAiError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)?;
    if let Some(feedback) = parsed.prompt_feedback.as_ref() {
        if let Some(reason) = feedback.block_reason.as_deref() {
            return Err(FailtraceAiError::InvalidResponse(format!(
                "prompt was blocked: {reason}"
            )));
        }
    }

    let candidate = parsed
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| {
            FailtraceAiError::InvalidResponse("response contained no candidates".to_string())
        })?;

    let blocks = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .map(|text| ContentBlock::Text { text })
        .collect::<Vec<_>>();

    let usage = parsed
        .usage_metadata
        .map(|usage| ChatUsage {
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            total_tokens: usage.total_token_count.unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        message: Message::assistant_blocks(blocks),
        finish_reason: candidate.finish_reason,
        usage,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<GenerateContentCandidate>>,
    usage_metadata: Option<GenerateContentUsage>,
    prompt_feedback: Option<GenerateContentPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentCandidate {
    content: Option<GenerateContentContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentContent {
    parts: Option<Vec<GenerateContentPart>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentUsage {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{build_generate_content_body, parse_generate_content_response, GoogleClient};
    use crate::{ChatRequest, FailtraceAiError, GoogleConfig, Message};

    #[test]
    fn unit_body_maps_roles_and_skips_blank_turns() {
        let request = ChatRequest {
            model: "gemini-1.5-flash".to_string(),
            messages: vec![
                Message::user("what failed?"),
                Message::assistant_text("   "),
                Message::assistant_text("the linker"),
            ],
        };

        let body = build_generate_content_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "the linker");
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn regression_single_prompt_body_carries_only_contents() {
        let body =
            build_generate_content_body(&ChatRequest::single_prompt("gemini-1.5-flash", "logs"));
        assert_eq!(body.as_object().map(|fields| fields.len()), Some(1));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "logs");
    }

    #[test]
    fn unit_parse_response_collects_text_and_usage() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Main Error: x"}, {"text": "Fix: y"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 10,
                "candidatesTokenCount": 4,
                "totalTokenCount": 14
            }
        })
        .to_string();

        let response = parse_generate_content_response(&raw).expect("parse response");
        assert_eq!(response.message.text_content(), "Main Error: x\nFix: y");
        assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[test]
    fn regression_parse_response_rejects_missing_candidates() {
        let error = parse_generate_content_response(r#"{"candidates": []}"#)
            .expect_err("empty candidates should fail");
        assert!(matches!(error, FailtraceAiError::InvalidResponse(_)));
    }

    #[test]
    fn regression_parse_response_reports_blocked_prompts() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let error = parse_generate_content_response(raw).expect_err("blocked prompt");
        assert!(error.to_string().contains("SAFETY"));
    }

    #[test]
    fn unit_client_rejects_blank_api_key() {
        let error = GoogleClient::new(GoogleConfig::with_api_key("   "))
            .expect_err("blank key should be rejected");
        assert!(matches!(error, FailtraceAiError::MissingApiKey));
    }

    #[test]
    fn unit_generate_content_url_supports_model_placeholder() {
        let mut config = GoogleConfig::with_api_key("key");
        config.api_base = "http://localhost/v1beta/models/{model}:generateContent".to_string();
        let client = GoogleClient::new(config).expect("client");
        assert_eq!(
            client.generate_content_url("gemini-pro"),
            "http://localhost/v1beta/models/gemini-pro:generateContent"
        );
    }
}
