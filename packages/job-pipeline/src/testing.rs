//! Testing utilities including mock implementations.
//!
//! These let applications exercise the pipeline without network or AI calls.
//! Every mock is `Clone` and shares its state, so a test can hand one copy to
//! the pipeline and keep another for assertions.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{
    SinkError, SinkResult, SourceError, SourceResult, SummarizeError, SummarizeResult,
};
use crate::traits::{
    sink::JobSink,
    source::JobSource,
    summarizer::{InputDetail, Summarizer},
};
use crate::types::{job::Job, raw::RawJob, summary::JobSummary};

/// Failure kinds a mock can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Retryable: 5xx / timeout
    Transient,

    /// Retryable: 429 with a retry-after hint
    RateLimited(Duration),

    /// Retryable for summarizers: unparseable model output
    Malformed,

    /// Not retryable: credentials rejected
    Fatal,
}

impl MockFailure {
    fn source_error(self, url: &str) -> SourceError {
        match self {
            Self::Transient => SourceError::Timeout { url: url.into() },
            Self::RateLimited(delay) => SourceError::RateLimited {
                url: url.into(),
                retry_after: Some(delay),
            },
            Self::Malformed => SourceError::Extract {
                reason: "unexpected markup".into(),
            },
            Self::Fatal => SourceError::Auth { url: url.into() },
        }
    }

    fn summarize_error(self) -> SummarizeError {
        match self {
            Self::Transient => SummarizeError::Overloaded("mock 503".into()),
            Self::RateLimited(delay) => SummarizeError::RateLimited {
                retry_after: Some(delay),
            },
            Self::Malformed => SummarizeError::MalformedOutput {
                reason: "mock returned prose".into(),
            },
            Self::Fatal => SummarizeError::Auth("mock key rejected".into()),
        }
    }
}

/// Tracks how many calls overlap, across every mock that shares it.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A mock job board returning canned raw blobs.
#[derive(Clone)]
pub struct MockSource {
    name: String,
    blobs: Arc<RwLock<Vec<RawJob>>>,
    failures: Arc<RwLock<VecDeque<MockFailure>>>,
    always_fail: Option<MockFailure>,
    delay: Option<Duration>,
    gauge: ConcurrencyGauge,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: Arc::default(),
            failures: Arc::default(),
            always_fail: None,
            delay: None,
            gauge: ConcurrencyGauge::default(),
            calls: Arc::default(),
        }
    }

    /// Listing URL the mock uses for its `index`th generated blob.
    pub fn listing_url(&self, index: usize) -> String {
        format!("https://{}.example.com/jobs/{}", self.name, index)
    }

    /// Add `count` generated listings.
    pub fn with_listings(self, count: usize) -> Self {
        let start = self.blobs.read().unwrap().len();
        for index in start..start + count {
            let url = self.listing_url(index);
            let raw = RawJob::new(&self.name, &url, format!("<h1>Listing {index}</h1>"))
                .with_id(format!("{}-{}", self.name, index))
                .with_text(format!("Listing {index}"));
            self.blobs.write().unwrap().push(raw);
        }
        self
    }

    /// Add one specific blob.
    pub fn with_raw(self, raw: RawJob) -> Self {
        self.blobs.write().unwrap().push(raw);
        self
    }

    /// Fail the next `times` fetches with `failure`, then succeed.
    pub fn failing_times(self, times: usize, failure: MockFailure) -> Self {
        self.failures
            .write()
            .unwrap()
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    /// Fail every fetch.
    pub fn always_failing(mut self, failure: MockFailure) -> Self {
        self.always_fail = Some(failure);
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Record fetch overlap on `gauge`, shared with other mocks.
    pub fn with_gauge(mut self, gauge: &ConcurrencyGauge) -> Self {
        self.gauge = gauge.clone();
        self
    }

    /// Number of `fetch_and_extract` calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn scripted_result(&self) -> SourceResult<Vec<RawJob>> {
        let search_url = format!("https://{}.example.com/search", self.name);
        if let Some(failure) = self.always_fail {
            return Err(failure.source_error(&search_url));
        }
        if let Some(failure) = self.failures.write().unwrap().pop_front() {
            return Err(failure.source_error(&search_url));
        }

        Ok(self.blobs.read().unwrap().clone())
    }
}

#[async_trait]
impl JobSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_and_extract(&self) -> SourceResult<Vec<RawJob>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gauge.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.scripted_result();

        self.gauge.exit();
        result
    }
}

/// Record of a call made to the mock summarizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSummarizeCall {
    pub url: String,
    pub detail: InputDetail,
}

/// A mock summarizer with per-URL scripting.
///
/// Unscripted listings succeed with a summary titled after the blob's text
/// and the salary registered via [`with_salary`](Self::with_salary), if any.
#[derive(Clone, Default)]
pub struct MockSummarizer {
    salaries: Arc<RwLock<HashMap<String, i64>>>,
    full_salaries: Arc<RwLock<HashMap<String, i64>>>,
    failures: Arc<RwLock<HashMap<String, VecDeque<MockFailure>>>>,
    always_fail: Arc<RwLock<HashMap<String, MockFailure>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockSummarizeCall>>>,
    gauge: ConcurrencyGauge,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `upper` as the salary upper bound for `url`.
    pub fn with_salary(self, url: impl Into<String>, upper: i64) -> Self {
        self.salaries.write().unwrap().insert(url.into(), upper);
        self
    }

    /// Report a salary for `url` only when given full input.
    pub fn with_full_input_salary(self, url: impl Into<String>, upper: i64) -> Self {
        self.full_salaries.write().unwrap().insert(url.into(), upper);
        self
    }

    /// Fail the next `times` calls for `url`, then succeed.
    pub fn failing_times(self, url: impl Into<String>, times: usize, failure: MockFailure) -> Self {
        self.failures
            .write()
            .unwrap()
            .entry(url.into())
            .or_default()
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    /// Fail every call for `url`.
    pub fn always_failing(self, url: impl Into<String>, failure: MockFailure) -> Self {
        self.always_fail.write().unwrap().insert(url.into(), failure);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All calls made, in order.
    pub fn calls(&self) -> Vec<MockSummarizeCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Calls made for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|c| c.url == url).count()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.gauge.peak()
    }

    fn scripted_failure(&self, url: &str) -> Option<MockFailure> {
        if let Some(failure) = self.always_fail.read().unwrap().get(url) {
            return Some(*failure);
        }
        self.failures
            .write()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
    }

    fn summary_for(&self, raw: &RawJob, detail: InputDetail) -> JobSummary {
        let mut upper = self.salaries.read().unwrap().get(&raw.url).copied();
        if detail == InputDetail::Full {
            upper = upper.or_else(|| self.full_salaries.read().unwrap().get(&raw.url).copied());
        }

        JobSummary {
            title: Some(raw.input(InputDetail::Standard).trim().to_string()),
            company: Some(format!("{} Inc", raw.source)),
            salary: upper.map(|u| format!("${u}")),
            salary_upper: upper,
            summary: Some("Mock summary".into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, raw: &RawJob, detail: InputDetail) -> SummarizeResult<JobSummary> {
        self.calls.write().unwrap().push(MockSummarizeCall {
            url: raw.url.clone(),
            detail,
        });

        self.gauge.enter();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.scripted_failure(&raw.url) {
            Some(failure) => Err(failure.summarize_error()),
            None => Ok(self.summary_for(raw, detail)),
        };

        self.gauge.exit();
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A sink that rejects every write.
#[derive(Debug, Clone)]
pub struct FailingSink {
    name: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attempts: Arc::default(),
        }
    }

    /// Number of writes attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _job: &Job) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only destination",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;

    #[tokio::test]
    async fn test_mock_source_fails_then_recovers() {
        let source = MockSource::new("board")
            .with_listings(2)
            .failing_times(1, MockFailure::Transient);

        let err = source.fetch_and_extract().await.unwrap_err();
        assert!(err.is_retryable());

        let blobs = source.fetch_and_extract().await.unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[1].url, "https://board.example.com/jobs/1");
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_summarizer_scripting() {
        let raw = RawJob::new("board", "https://x/1", "<p>Rust</p>").with_text("Rust");
        let summarizer = MockSummarizer::new()
            .with_full_input_salary("https://x/1", 150_000)
            .failing_times("https://x/1", 1, MockFailure::Fatal);

        assert!(!summarizer
            .summarize(&raw, InputDetail::Standard)
            .await
            .unwrap_err()
            .is_retryable());

        let standard = summarizer.summarize(&raw, InputDetail::Standard).await.unwrap();
        assert_eq!(standard.title.as_deref(), Some("Rust"));
        assert!(!standard.has_salary());

        let full = summarizer.summarize(&raw, InputDetail::Full).await.unwrap();
        assert_eq!(full.salary_upper, Some(150_000));

        assert_eq!(summarizer.calls_for("https://x/1"), 3);
        assert_eq!(summarizer.calls()[2].detail, InputDetail::Full);
    }
}
