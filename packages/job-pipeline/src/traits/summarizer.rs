//! Summarizer trait for AI structuring of raw blobs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SummarizeResult;
use crate::types::raw::RawJob;
use crate::types::summary::JobSummary;

/// How much of a raw blob to send to the summarizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDetail {
    /// Cleaned text (cheaper)
    #[default]
    Standard,

    /// Raw page content (more tokens, more detail)
    Full,
}

/// Turns a raw blob into structured job fields.
///
/// `Ok` with unset fields means "understood, but unknown". `Err` is a real
/// failure and is retried by the pipeline when
/// [`Retryable::is_retryable`](crate::retry::Retryable::is_retryable) says so.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize one raw blob.
    async fn summarize(&self, raw: &RawJob, detail: InputDetail) -> SummarizeResult<JobSummary>;

    /// Name for logging.
    fn name(&self) -> &str {
        "summarizer"
    }
}
