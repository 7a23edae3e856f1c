//! Run results: per-source, per-sink and dropped-item accounting.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::types::job::Job;

/// How a completed run ended.
///
/// A run that could not start is an `Err(PipelineError)` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// At least one job was produced
    Completed,

    /// Sources ran but nothing survived summarization
    NoJobs,

    /// Every source failed to fetch
    AllSourcesFailed,
}

/// Pipeline stage at which an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStage {
    /// The whole source failed to fetch or extract
    Fetch,

    /// One listing failed summarization
    Summarize,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Summarize => write!(f, "summarize"),
        }
    }
}

/// An item lost during the run, with its cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedItem {
    pub source: String,
    /// Listing URL; `None` for a failed source
    pub url: Option<String>,
    pub stage: DropStage,
    pub cause: String,
    pub attempts: u32,
}

/// Per-source accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,

    /// Fetch attempts made
    pub fetch_attempts: u32,

    /// Raw blobs returned by the source
    pub fetched: usize,

    /// Jobs successfully summarized
    pub summarized: usize,

    /// Blobs dropped after exhausting the summarize budget
    pub dropped: usize,

    /// Blobs never summarized because the dev-mode cap was reached
    pub capped: usize,

    /// Re-queries made with full input for missing salary
    pub escalations: usize,

    /// Fetch failure, if the source contributed nothing
    pub error: Option<String>,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-sink accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SinkReport {
    pub sink: String,
    pub written: usize,
    pub failed: usize,

    /// First write error, or the flush error
    pub error: Option<String>,
}

impl SinkReport {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Everything that happened in one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub sources: Vec<SourceReport>,
    pub sinks: Vec<SinkReport>,
    pub dropped: Vec<DroppedItem>,

    /// Jobs removed because their source already produced the same id.
    ///
    /// Keys include the source, so these always come from one board,
    /// usually when the summarizer reports one id for two listings.
    pub duplicates: usize,

    /// Final ordered jobs, as handed to every sink
    pub jobs: Vec<Job>,

    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    /// Raw blobs fetched across all sources.
    pub fn jobs_found(&self) -> usize {
        self.sources.iter().map(|s| s.fetched).sum()
    }

    /// Jobs summarized across all sources (before de-duplication).
    pub fn jobs_summarized(&self) -> usize {
        self.sources.iter().map(|s| s.summarized).sum()
    }

    /// Sources that contributed nothing because fetching failed.
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.failed())
    }

    pub fn sink(&self, name: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|s| s.sink == name)
    }

    /// Whether every sink accepted every job.
    pub fn all_sinks_succeeded(&self) -> bool {
        self.sinks.iter().all(SinkReport::is_success)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Run {:?} in {:.1}s: {} found, {} summarized, {} kept, {} duplicates, {} dropped",
            self.outcome,
            self.elapsed.as_secs_f64(),
            self.jobs_found(),
            self.jobs_summarized(),
            self.jobs.len(),
            self.duplicates,
            self.dropped.len()
        )?;

        for source in &self.sources {
            write!(
                f,
                "  source {}: {} fetched, {} summarized, {} dropped, {} capped",
                source.source, source.fetched, source.summarized, source.dropped, source.capped
            )?;
            match &source.error {
                Some(error) => writeln!(f, " (failed: {error})")?,
                None => writeln!(f)?,
            }
        }

        for sink in &self.sinks {
            write!(
                f,
                "  sink {}: {} written, {} failed",
                sink.sink, sink.written, sink.failed
            )?;
            match &sink.error {
                Some(error) => writeln!(f, " ({error})")?,
                None => writeln!(f)?,
            }
        }

        for item in &self.dropped {
            writeln!(
                f,
                "  dropped [{}] {} {}: {}",
                item.stage,
                item.source,
                item.url.as_deref().unwrap_or("-"),
                item.cause
            )?;
        }

        Ok(())
    }
}
