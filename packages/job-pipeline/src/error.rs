//! Typed errors for the job pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so every stage can
//! classify its failures as retryable or permanent.

use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;

/// Fatal errors raised before a run starts.
///
/// Anything that happens once the pipeline is running is absorbed into the
/// [`RunReport`](crate::pipeline::RunReport) instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No job sources were registered
    #[error("no job sources configured")]
    NoSources,

    /// No sinks were registered
    #[error("no sinks configured")]
    NoSinks,

    /// No summarizer was registered
    #[error("no summarizer configured")]
    NoSummarizer,

    /// Pipeline configuration is unusable
    #[error("invalid pipeline config: {reason}")]
    InvalidConfig { reason: String },
}

/// Errors raised while fetching and extracting listings from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP 429 from the job board
    #[error("rate limited fetching {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status other than 429 / auth failures
    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    /// Connection failure, reset, DNS
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Credentials rejected (401/403)
    #[error("authentication failed for {url}")]
    Auth { url: String },

    /// Source descriptor is unusable (bad URL, bad pattern)
    #[error("invalid source config: {reason}")]
    InvalidConfig { reason: String },

    /// Page fetched but listings could not be extracted
    #[error("extraction failed: {reason}")]
    Extract { reason: String },
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => matches!(*status, 408 | 425 | 500..=599),
            Self::Auth { .. } | Self::InvalidConfig { .. } | Self::Extract { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors raised by a [`Summarizer`](crate::traits::summarizer::Summarizer).
///
/// A summarizer that understood the listing but could not find a field
/// returns `Ok` with that field unset; these variants are real failures.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Provider returned HTTP 429
    #[error("AI provider rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Provider is temporarily overloaded (5xx)
    #[error("AI provider overloaded: {0}")]
    Overloaded(String),

    /// Transport failure talking to the provider
    #[error("AI provider unreachable: {0}")]
    Network(String),

    /// The model answered with something that is not a usable job record
    #[error("malformed AI output: {reason}")]
    MalformedOutput { reason: String },

    /// API key rejected
    #[error("AI provider rejected credentials: {0}")]
    Auth(String),

    /// Provider rejected the request itself (4xx other than 401/403/429)
    #[error("AI provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Raw blob cannot be summarized (empty page, missing content)
    #[error("invalid summarizer input: {reason}")]
    InvalidInput { reason: String },

    /// The summarizer spent its own transport retry budget (429 / 5xx)
    #[error("AI provider unavailable after {attempts} attempts: {reason}")]
    ProviderUnavailable { attempts: u32, reason: String },

    /// Concurrency limiter was shut down
    #[error("summarization cancelled")]
    Cancelled,
}

impl Retryable for SummarizeError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Overloaded(_)
                | Self::Network(_)
                | Self::MalformedOutput { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Errors raised while writing jobs to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// File I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised while validating or executing a step plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Step refers to a tool that is not registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Template string is not a plain `{{ key }}` reference
    #[error("invalid input template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Tool declares an input the step does not bind
    #[error("step {step} ({tool}) is missing input '{slot}'")]
    MissingInput {
        step: usize,
        tool: String,
        slot: String,
    },

    /// Step binds an input the tool does not declare
    #[error("step {step} ({tool}) binds undeclared input '{slot}'")]
    UndeclaredInput {
        step: usize,
        tool: String,
        slot: String,
    },

    /// Binding refers to an output no earlier step produces
    #[error("step {step} references unknown output '{key}'")]
    UnresolvedOutput { step: usize, key: String },

    /// Two steps write the same output key
    #[error("output key '{key}' is produced more than once")]
    DuplicateOutput { key: String },

    /// Plan JSON could not be parsed
    #[error("plan parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Tool execution failed
    #[error("tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },
}

/// Result type alias for pipeline construction.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for summarizer operations.
pub type SummarizeResult<T> = std::result::Result<T, SummarizeError>;

/// Result type alias for sink operations.
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Result type alias for plan operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_rate_limit_is_retryable() {
        let err = SourceError::RateLimited {
            url: "https://jobs.example.com".into(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_source_status_classification() {
        let server = SourceError::Status {
            status: 503,
            url: "u".into(),
        };
        let missing = SourceError::Status {
            status: 404,
            url: "u".into(),
        };
        assert!(server.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!SourceError::Auth { url: "u".into() }.is_retryable());
    }

    #[test]
    fn test_summarize_classification() {
        assert!(SummarizeError::RateLimited { retry_after: None }.is_retryable());
        assert!(SummarizeError::MalformedOutput {
            reason: "no JSON".into()
        }
        .is_retryable());
        assert!(!SummarizeError::Auth("bad key".into()).is_retryable());
        assert!(!SummarizeError::InvalidInput {
            reason: "empty".into()
        }
        .is_retryable());
        assert!(!SummarizeError::ProviderUnavailable {
            attempts: 8,
            reason: "rate limited".into()
        }
        .is_retryable());
    }
}
