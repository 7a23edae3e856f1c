//! OpenAI-backed summarizer.
//!
//! # Example
//!
//! ```rust,ignore
//! use job_pipeline::summarizers::OpenAiSummarizer;
//! use openai_client::OpenAIClient;
//!
//! let summarizer = OpenAiSummarizer::new(OpenAIClient::from_env()?)
//!     .with_model("gpt-4o-mini")
//!     .with_profile(std::fs::read_to_string("resume.txt")?);
//! ```

use async_trait::async_trait;
use openai_client::{truncate_to_char_boundary, ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;
use tracing::{debug, warn};

use super::parse::parse_summary;
use super::prompts::{format_job_input, JOB_SUMMARY_PROMPT};
use crate::error::{SummarizeError, SummarizeResult};
use crate::retry::{RetryError, RetryPolicy, Retryable};
use crate::traits::summarizer::{InputDetail, Summarizer};
use crate::types::raw::RawJob;
use crate::types::summary::JobSummary;

/// Inputs longer than this are cut to keep token cost bounded.
const MAX_INPUT_BYTES: usize = 60_000;

impl Retryable for OpenAIError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }

    fn retry_after(&self) -> Option<Duration> {
        OpenAIError::retry_after(self)
    }
}

/// Summarizer that asks an OpenAI chat model for a JSON job record.
///
/// Transient HTTP failures (429, 5xx, timeouts) are retried here under the
/// HTTP policy. When that budget runs out the call fails with
/// [`SummarizeError::ProviderUnavailable`], which the per-job budget does not
/// retry. Malformed output is returned as a retryable error so the pipeline
/// can ask again.
#[derive(Clone)]
pub struct OpenAiSummarizer {
    client: OpenAIClient,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
    prompt: String,
    profile: Option<String>,
    http_retry: RetryPolicy,
}

impl OpenAiSummarizer {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.2),
            max_tokens: 1500,
            prompt: JOB_SUMMARY_PROMPT.to_string(),
            profile: None,
            http_retry: RetryPolicy::http(),
        }
    }

    /// Set the chat model (default: gpt-4o-mini).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set sampling temperature; `None` uses the model default.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replace the built-in system prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Candidate profile used to score `fit`.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Retry policy for transient HTTP failures.
    pub fn with_http_retry(mut self, policy: RetryPolicy) -> Self {
        self.http_retry = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, raw: &RawJob, detail: InputDetail) -> ChatRequest {
        let content = truncate_to_char_boundary(raw.input(detail), MAX_INPUT_BYTES);
        let user = format_job_input(&raw.url, content, self.profile.as_deref());

        let mut request = ChatRequest::new(&self.model)
            .message(Message::system(&self.prompt))
            .message(Message::user(user))
            .output_limit(self.max_tokens)
            .json_object();
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }
        request
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, raw: &RawJob, detail: InputDetail) -> SummarizeResult<JobSummary> {
        if raw.is_empty() {
            return Err(SummarizeError::InvalidInput {
                reason: format!("empty content for {}", raw.url),
            });
        }

        let request = self.build_request(raw, detail);

        let response = self
            .http_retry
            .run_observed(
                || self.client.chat_completion(request.clone()),
                |event| {
                    warn!(
                        url = %raw.url,
                        attempt = event.attempt,
                        delay_ms = event.delay.as_millis() as u64,
                        error = %event.error,
                        "OpenAI call failed, backing off"
                    )
                },
            )
            .await
            .map_err(map_retry_error)?
            .value;

        debug!(
            url = %raw.url,
            model = %self.model,
            tokens = ?response.usage.as_ref().map(|u| u.total_tokens),
            "Summarized listing"
        );

        parse_summary(&response.content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn map_retry_error(error: RetryError<OpenAIError>) -> SummarizeError {
    if error.is_fatal() {
        return to_summarize_error(error.into_error());
    }
    SummarizeError::ProviderUnavailable {
        attempts: error.attempts(),
        reason: error.into_error().to_string(),
    }
}

/// Map a client error onto the pipeline's summarizer taxonomy.
pub(crate) fn to_summarize_error(error: OpenAIError) -> SummarizeError {
    if error.is_auth() {
        return SummarizeError::Auth(error.to_string());
    }
    match error {
        OpenAIError::RateLimited { retry_after, .. } => SummarizeError::RateLimited { retry_after },
        OpenAIError::Network { message, .. } => SummarizeError::Network(message),
        OpenAIError::Api { status, message } if error_is_overload(status) => {
            SummarizeError::Overloaded(format!("HTTP {status}: {message}"))
        }
        OpenAIError::Api { status, message } => SummarizeError::Rejected { status, message },
        OpenAIError::Parse(reason) => SummarizeError::MalformedOutput { reason },
        OpenAIError::Config(message) => SummarizeError::Auth(message),
    }
}

fn error_is_overload(status: u16) -> bool {
    matches!(status, 408 | 409 | 500..=599)
}
