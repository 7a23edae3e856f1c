//! Resolved configuration for a pipeline run.

use crate::error::PipelineError;
use crate::retry::RetryPolicy;

/// Configuration for the orchestrator.
///
/// The pipeline does not read files; callers build this from whatever
/// configuration surface they have.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Cap jobs summarized per source.
    ///
    /// Exists to bound AI spend while testing. Default: false.
    pub dev_mode: bool,

    /// Per-source cap applied when `dev_mode` is on. Default: 2.
    pub dev_mode_job_limit: usize,

    /// Maximum sources processed concurrently.
    ///
    /// The worker pool width is the smaller of this and the source count;
    /// 1 processes sources sequentially. Default: 5.
    pub max_workers: usize,

    /// Concurrent summarizer calls across all sources.
    ///
    /// Shared because provider rate limits are account-wide. Default: 5.
    pub summarize_concurrency: usize,

    /// Re-query once with full input when no salary bound was found.
    pub retry_on_missing_salary: bool,

    /// Retry policy wrapped around each source's fetch+extract.
    pub fetch_retry: RetryPolicy,

    /// Retry policy wrapped around each job's summarization.
    pub summarize_retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            dev_mode_job_limit: 2,
            max_workers: 5,
            summarize_concurrency: 5,
            retry_on_missing_salary: false,
            fetch_retry: RetryPolicy::default(),
            summarize_retry: RetryPolicy::summarize(),
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable dev mode with the given per-source cap.
    pub fn with_dev_mode(mut self, job_limit: usize) -> Self {
        self.dev_mode = true;
        self.dev_mode_job_limit = job_limit;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_summarize_concurrency(mut self, concurrency: usize) -> Self {
        self.summarize_concurrency = concurrency;
        self
    }

    pub fn with_retry_on_missing_salary(mut self, enabled: bool) -> Self {
        self.retry_on_missing_salary = enabled;
        self
    }

    pub fn with_fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch_retry = policy;
        self
    }

    pub fn with_summarize_retry(mut self, policy: RetryPolicy) -> Self {
        self.summarize_retry = policy;
        self
    }

    /// Per-source job cap, if one applies.
    pub fn job_cap(&self) -> Option<usize> {
        self.dev_mode.then_some(self.dev_mode_job_limit)
    }

    /// Reject unusable settings before any fetch or AI call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |reason: String| PipelineError::InvalidConfig { reason };

        if self.max_workers == 0 {
            return Err(invalid("max_workers must be at least 1".into()));
        }
        if self.summarize_concurrency == 0 {
            return Err(invalid("summarize_concurrency must be at least 1".into()));
        }
        if self.dev_mode && self.dev_mode_job_limit == 0 {
            return Err(invalid("dev_mode_job_limit must be at least 1".into()));
        }
        self.fetch_retry
            .validate()
            .map_err(|e| invalid(format!("fetch_retry: {e}")))?;
        self.summarize_retry
            .validate()
            .map_err(|e| invalid(format!("summarize_retry: {e}")))?;
        Ok(())
    }
}
