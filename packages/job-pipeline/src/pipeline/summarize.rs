//! Per-source summarization: dev-mode cap, shared limiter, per-job retry
//! budget and the missing-salary escalation.
//!
//! Used by the orchestrator and by the `summarize_jobs` plan tool so both
//! spend AI calls under the same rules.

use futures::future::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::report::{DropStage, DroppedItem};
use crate::error::SummarizeError;
use crate::traits::summarizer::{InputDetail, Summarizer};
use crate::types::{config::PipelineConfig, job::Job, raw::RawJob, summary::JobSummary};

/// What summarizing one source's listings produced.
#[derive(Debug, Default)]
pub(crate) struct BatchOutcome {
    /// Jobs in listing order
    pub jobs: Vec<Job>,
    pub dropped: Vec<DroppedItem>,
    /// Listings never started because the cap was reached
    pub capped: usize,
    pub escalations: usize,
}

/// Result of summarizing one listing.
struct ListingOutcome {
    result: Result<Job, DroppedItem>,
    escalated: bool,
}

pub(crate) struct Summarization<'a> {
    pub summarizer: &'a dyn Summarizer,
    pub config: &'a PipelineConfig,
    pub limiter: &'a Semaphore,
}

impl Summarization<'_> {
    /// Summarize one source's listings.
    ///
    /// In dev mode a new listing starts only while finished + in-flight jobs
    /// stay below the cap; in-flight calls always drain.
    pub async fn run(&self, source: &str, blobs: &[RawJob]) -> BatchOutcome {
        let cap = self.config.job_cap();
        let mut outcome = BatchOutcome::default();
        let mut jobs: Vec<(usize, Job)> = Vec::new();
        let mut pending = blobs.iter();
        let mut in_flight = FuturesUnordered::new();
        let mut launched = 0usize;

        loop {
            while in_flight.len() < self.config.summarize_concurrency
                && cap.map_or(true, |cap| jobs.len() + in_flight.len() < cap)
            {
                let Some(raw) = pending.next() else { break };
                let index = launched;
                launched += 1;
                in_flight.push(self.listing(raw).map(move |outcome| (index, outcome)));
            }

            let Some((index, listing)) = in_flight.next().await else {
                break;
            };
            if listing.escalated {
                outcome.escalations += 1;
            }
            match listing.result {
                Ok(job) => jobs.push((index, job)),
                Err(item) => outcome.dropped.push(item),
            }
        }

        // Completion order varies; report jobs in listing order
        jobs.sort_by_key(|(index, _)| *index);
        outcome.jobs = jobs.into_iter().map(|(_, job)| job).collect();

        outcome.capped = blobs.len() - launched;
        if outcome.capped > 0 {
            info!(
                source = %source,
                cap = ?cap,
                skipped = outcome.capped,
                "Dev mode cap reached"
            );
        }

        outcome
    }

    /// Summarize one listing under the per-job retry budget.
    async fn listing(&self, raw: &RawJob) -> ListingOutcome {
        let policy = &self.config.summarize_retry;

        let result = policy
            .run_observed(
                || self.call(raw, InputDetail::Standard),
                |event| {
                    warn!(
                        source = %raw.source,
                        url = %raw.url,
                        attempt = event.attempt,
                        error = %event.error,
                        "Summarize failed, retrying"
                    )
                },
            )
            .await;

        let retried = match result {
            Ok(retried) => retried,
            Err(e) => {
                warn!(
                    source = %raw.source,
                    url = %raw.url,
                    attempts = e.attempts(),
                    error = %e,
                    "Dropping listing"
                );
                return ListingOutcome {
                    result: Err(DroppedItem {
                        source: raw.source.clone(),
                        url: Some(raw.url.clone()),
                        stage: DropStage::Summarize,
                        cause: e.error().to_string(),
                        attempts: e.attempts(),
                    }),
                    escalated: false,
                };
            }
        };

        let mut summary = retried.value;
        let mut escalated = false;

        if self.config.retry_on_missing_salary
            && !summary.has_salary()
            && retried.attempts < policy.max_attempts
        {
            escalated = true;
            debug!(url = %raw.url, "No salary found, re-querying with full content");
            match self.call(raw, InputDetail::Full).await {
                Ok(richer) if richer.has_salary() => summary = richer,
                Ok(_) => debug!(url = %raw.url, "Full content had no salary either"),
                Err(e) => {
                    warn!(
                        url = %raw.url,
                        error = %e,
                        "Salary re-query failed, keeping first summary"
                    )
                }
            }
        }

        ListingOutcome {
            result: Ok(Job::from_summary(raw, summary)),
            escalated,
        }
    }

    /// One summarizer call holding a permit from the shared limiter.
    ///
    /// The permit covers the summarizer's own transport retries and is
    /// released before the per-job backoff.
    async fn call(&self, raw: &RawJob, detail: InputDetail) -> Result<JobSummary, SummarizeError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| SummarizeError::Cancelled)?;
        self.summarizer.summarize(raw, detail).await
    }
}
