//! Pipeline orchestrator: fetch → summarize → dedupe → sort → write.
//!
//! Sources run concurrently in a worker pool as wide as the smaller of
//! `max_workers` and the source count. Each source's listings are summarized
//! concurrently, bounded by one semaphore shared by every source because AI
//! rate limits are account-wide. Failures are absorbed at the lowest level:
//!
//! - a source that exhausts its fetch budget contributes zero jobs;
//! - a listing that exhausts its summarize budget is dropped;
//! - a sink that fails is reported and the remaining sinks still run.
//!
//! Only construction errors ([`PipelineError`]) stop a run.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::report::{DropStage, DroppedItem, RunOutcome, RunReport, SinkReport, SourceReport};
use super::sort::{FieldSorter, JobSorter};
use super::summarize::Summarization;
use crate::error::{PipelineError, Result};
use crate::traits::{sink::JobSink, source::JobSource, summarizer::Summarizer};
use crate::types::{config::PipelineConfig, job::Job};

/// A configured pipeline, ready to run.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::builder()
///     .source(board_a)
///     .source(board_b)
///     .summarizer(OpenAiSummarizer::new(client))
///     .sink(TsvSink::open("jobs.tsv").await?)
///     .config(PipelineConfig::new().with_dev_mode(2))
///     .build()?;
///
/// let report = pipeline.run().await;
/// println!("{report}");
/// ```
pub struct Pipeline {
    sources: Vec<Arc<dyn JobSource>>,
    summarizer: Arc<dyn Summarizer>,
    sinks: Vec<Arc<dyn JobSink>>,
    sorter: Arc<dyn JobSorter>,
    config: PipelineConfig,
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    sources: Vec<Arc<dyn JobSource>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    sinks: Vec<Arc<dyn JobSink>>,
    sorter: Option<Arc<dyn JobSorter>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source.
    pub fn source(mut self, source: impl JobSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Add a shared source.
    pub fn source_arc(mut self, source: Arc<dyn JobSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the summarizer.
    pub fn summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.summarizer = Some(Arc::new(summarizer));
        self
    }

    /// Set a shared summarizer.
    pub fn summarizer_arc(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Add a sink.
    pub fn sink(mut self, sink: impl JobSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Add a shared sink.
    pub fn sink_arc(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Replace the default sorter (salary_upper descending).
    pub fn sorter(mut self, sorter: impl JobSorter + 'static) -> Self {
        self.sorter = Some(Arc::new(sorter));
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and build. Fails before any fetch or AI call.
    pub fn build(self) -> Result<Pipeline> {
        if self.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }
        if self.sinks.is_empty() {
            return Err(PipelineError::NoSinks);
        }
        let summarizer = self.summarizer.ok_or(PipelineError::NoSummarizer)?;
        self.config.validate()?;

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name().to_string()) {
                return Err(PipelineError::InvalidConfig {
                    reason: format!("duplicate source name '{}'", source.name()),
                });
            }
        }

        Ok(Pipeline {
            sources: self.sources,
            summarizer,
            sinks: self.sinks,
            sorter: self
                .sorter
                .unwrap_or_else(|| Arc::new(FieldSorter::default())),
            config: self.config,
        })
    }
}

/// What one source produced.
struct SourceOutcome {
    report: SourceReport,
    jobs: Vec<Job>,
    dropped: Vec<DroppedItem>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline once.
    ///
    /// Never fails: every recoverable error is recorded in the report.
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let limiter = Semaphore::new(self.config.summarize_concurrency);
        let width = self.config.max_workers.min(self.sources.len()).max(1);

        info!(
            sources = self.sources.len(),
            workers = width,
            summarize_concurrency = self.config.summarize_concurrency,
            job_cap = ?self.config.job_cap(),
            "Pipeline run starting"
        );

        // `buffered` keeps registration order for the aggregate while running
        // up to `width` sources at once
        let outcomes: Vec<SourceOutcome> = stream::iter(&self.sources)
            .map(|source| self.process_source(source.as_ref(), &limiter))
            .buffered(width)
            .collect()
            .await;

        let mut sources = Vec::with_capacity(outcomes.len());
        let mut dropped = Vec::new();
        let mut aggregate = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0;

        for outcome in outcomes {
            sources.push(outcome.report);
            dropped.extend(outcome.dropped);
            for job in outcome.jobs {
                if seen.insert(job.key()) {
                    aggregate.push(job);
                } else {
                    // Same source and id: usually the AI reported one id for
                    // two different listings
                    warn!(key = %job.key(), url = %job.url, "Duplicate job skipped");
                    duplicates += 1;
                }
            }
        }

        let jobs = self.sorter.sort(&aggregate);
        let sinks = self.write_sinks(&jobs).await;

        let outcome = if sources.iter().all(SourceReport::failed) {
            RunOutcome::AllSourcesFailed
        } else if jobs.is_empty() {
            RunOutcome::NoJobs
        } else {
            RunOutcome::Completed
        };

        let report = RunReport {
            outcome,
            sources,
            sinks,
            dropped,
            duplicates,
            jobs,
            elapsed: started.elapsed(),
        };

        info!(
            outcome = ?report.outcome,
            found = report.jobs_found(),
            summarized = report.jobs_summarized(),
            kept = report.jobs.len(),
            duplicates = report.duplicates,
            dropped = report.dropped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline run complete"
        );

        report
    }

    async fn process_source(&self, source: &dyn JobSource, limiter: &Semaphore) -> SourceOutcome {
        let name = source.name().to_string();
        let mut report = SourceReport::new(&name);
        let mut dropped = Vec::new();

        let fetched = self
            .config
            .fetch_retry
            .run_observed(
                || source.fetch_and_extract(),
                |event| {
                    warn!(
                        source = %name,
                        attempt = event.attempt,
                        delay_ms = event.delay.as_millis() as u64,
                        error = %event.error,
                        "Source fetch failed, retrying"
                    )
                },
            )
            .await;

        let blobs = match fetched {
            Ok(retried) => {
                report.fetch_attempts = retried.attempts;
                retried.value
            }
            Err(e) => {
                error!(source = %name, error = %e, "Source failed, contributing no jobs");
                report.fetch_attempts = e.attempts();
                report.error = Some(e.error().to_string());
                dropped.push(DroppedItem {
                    source: name,
                    url: None,
                    stage: DropStage::Fetch,
                    cause: e.to_string(),
                    attempts: e.attempts(),
                });
                return SourceOutcome {
                    report,
                    jobs: Vec::new(),
                    dropped,
                };
            }
        };

        report.fetched = blobs.len();
        info!(source = %name, listings = blobs.len(), "Source fetched");

        let batch = Summarization {
            summarizer: self.summarizer.as_ref(),
            config: &self.config,
            limiter,
        }
        .run(&name, &blobs)
        .await;

        report.capped = batch.capped;
        report.escalations = batch.escalations;
        report.summarized = batch.jobs.len();
        report.dropped = batch.dropped.len();
        dropped.extend(batch.dropped);

        SourceOutcome {
            report,
            jobs: batch.jobs,
            dropped,
        }
    }

    async fn write_sinks(&self, jobs: &[Job]) -> Vec<SinkReport> {
        let mut reports = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let mut report = SinkReport::new(sink.name());

            for job in jobs {
                match sink.write(job).await {
                    Ok(()) => report.written += 1,
                    Err(e) => {
                        warn!(
                            sink = %sink.name(),
                            key = %job.key(),
                            error = %e,
                            "Sink write failed"
                        );
                        report.failed += 1;
                        report.error.get_or_insert_with(|| e.to_string());
                    }
                }
            }

            if let Err(e) = sink.flush().await {
                warn!(sink = %sink.name(), error = %e, "Sink flush failed");
                report.error = Some(format!("flush failed: {e}"));
            }

            info!(
                sink = %sink.name(),
                written = report.written,
                failed = report.failed,
                "Sink finished"
            );
            reports.push(report);
        }

        reports
    }
}
