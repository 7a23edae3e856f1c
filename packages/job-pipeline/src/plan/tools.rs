//! Tools backed by the pipeline's own collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

use super::registry::{Tool, ToolError};
use crate::pipeline::report::DroppedItem;
use crate::pipeline::sort::JobSorter;
use crate::pipeline::summarize::Summarization;
use crate::retry::RetryPolicy;
use crate::traits::{source::JobSource, summarizer::Summarizer};
use crate::types::{config::PipelineConfig, job::Job, raw::RawJob};

fn take<T: serde::de::DeserializeOwned>(
    inputs: &HashMap<String, Value>,
    slot: &str,
) -> Result<T, ToolError> {
    let value = inputs
        .get(slot)
        .cloned()
        .ok_or_else(|| format!("missing input '{slot}'"))?;
    serde_json::from_value(value).map_err(|e| format!("input '{slot}': {e}").into())
}

/// `fetch_jobs(source) -> [RawJob]`
pub struct FetchJobsTool {
    sources: BTreeMap<String, Arc<dyn JobSource>>,
    retry: RetryPolicy,
}

impl FetchJobsTool {
    pub fn new(sources: impl IntoIterator<Item = Arc<dyn JobSource>>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|s| (s.name().to_string(), s))
                .collect(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Tool for FetchJobsTool {
    fn name(&self) -> &str {
        "fetch_jobs"
    }

    fn description(&self) -> &str {
        "Fetch raw listings from a named job board"
    }

    fn inputs(&self) -> &[&str] {
        &["source"]
    }

    fn output(&self) -> &str {
        "array of raw listings"
    }

    async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError> {
        let name: String = take(inputs, "source")?;
        let source = self
            .sources
            .get(&name)
            .ok_or_else(|| format!("unknown source '{name}'"))?;

        let fetched = self
            .retry
            .run(|| source.fetch_and_extract())
            .await
            .map_err(|e| Box::new(e.into_error()) as ToolError)?;

        Ok(serde_json::to_value(fetched.value)?)
    }
}

/// `summarize_jobs(jobs: [RawJob]) -> {jobs, dropped, capped}`
///
/// Runs under the same rules as a pipeline run: the dev-mode cap applies per
/// source, calls share one limiter, and the missing-salary escalation runs
/// when enabled. Listings that exhaust the retry budget are reported in
/// `dropped`.
pub struct SummarizeJobsTool {
    summarizer: Arc<dyn Summarizer>,
    config: PipelineConfig,
}

impl SummarizeJobsTool {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            summarizer,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }
}

/// Output of `summarize_jobs`.
#[derive(Debug, Default, Serialize)]
struct SummarizedJobs {
    jobs: Vec<Job>,
    dropped: Vec<DroppedItem>,
    capped: usize,
}

#[async_trait]
impl Tool for SummarizeJobsTool {
    fn name(&self) -> &str {
        "summarize_jobs"
    }

    fn description(&self) -> &str {
        "Structure raw listings into jobs with the AI summarizer"
    }

    fn inputs(&self) -> &[&str] {
        &["jobs"]
    }

    fn output(&self) -> &str {
        "object with jobs, dropped listings and capped count"
    }

    async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError> {
        let raw_jobs: Vec<RawJob> = take(inputs, "jobs")?;

        // Group by source, keeping first-seen order, so the cap is per source
        let mut batches: Vec<(String, Vec<RawJob>)> = Vec::new();
        for raw in raw_jobs {
            match batches.iter_mut().find(|(source, _)| *source == raw.source) {
                Some((_, blobs)) => blobs.push(raw),
                None => batches.push((raw.source.clone(), vec![raw])),
            }
        }

        let limiter = Semaphore::new(self.config.summarize_concurrency.max(1));
        let summarization = Summarization {
            summarizer: self.summarizer.as_ref(),
            config: &self.config,
            limiter: &limiter,
        };

        let mut output = SummarizedJobs::default();
        for (source, blobs) in &batches {
            let batch = summarization.run(source, blobs).await;
            output.jobs.extend(batch.jobs);
            output.dropped.extend(batch.dropped);
            output.capped += batch.capped;
        }

        if !output.dropped.is_empty() {
            warn!(
                dropped = output.dropped.len(),
                kept = output.jobs.len(),
                "summarize_jobs dropped listings"
            );
        }

        Ok(serde_json::to_value(output)?)
    }
}

/// Jobs given either directly or as a `summarize_jobs` result.
#[derive(Deserialize)]
#[serde(untagged)]
enum JobsInput {
    List(Vec<Job>),
    Summarized { jobs: Vec<Job> },
}

impl JobsInput {
    fn into_jobs(self) -> Vec<Job> {
        match self {
            Self::List(jobs) | Self::Summarized { jobs } => jobs,
        }
    }
}

/// `sort_jobs(jobs: [Job] | summarize_jobs output) -> [Job]`
pub struct SortJobsTool {
    sorter: Arc<dyn JobSorter>,
}

impl SortJobsTool {
    pub fn new(sorter: Arc<dyn JobSorter>) -> Self {
        Self { sorter }
    }
}

#[async_trait]
impl Tool for SortJobsTool {
    fn name(&self) -> &str {
        "sort_jobs"
    }

    fn inputs(&self) -> &[&str] {
        &["jobs"]
    }

    fn output(&self) -> &str {
        "array of jobs"
    }

    async fn run(&self, inputs: &HashMap<String, Value>) -> Result<Value, ToolError> {
        let jobs = take::<JobsInput>(inputs, "jobs")?.into_jobs();
        Ok(serde_json::to_value(self.sorter.sort(&jobs))?)
    }
}
