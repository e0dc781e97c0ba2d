//! Language-model client surface for failtrace.
//!
//! Exposes the provider-neutral [`LlmClient`] contract and the Gemini
//! `generateContent` implementation used to analyze CI failure excerpts.
mod google;
mod retry;
mod types;

pub use google::{GoogleClient, GoogleConfig, DEFAULT_GOOGLE_API_BASE, DEFAULT_GOOGLE_MODEL};
pub use retry::{parse_retry_after_ms, ProviderRetryPolicy};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, ContentBlock, FailtraceAiError, LlmClient, Message,
    MessageRole,
};
