//! Sink trait for job destinations.

use async_trait::async_trait;

use crate::error::SinkResult;
use crate::types::job::Job;

/// A destination that records jobs.
///
/// Writing the same `(source, id)` twice must leave one logical record.
/// Database sinks treat a duplicate-key error as success.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Name for logging and reports.
    fn name(&self) -> &str;

    /// Record one job.
    async fn write(&self, job: &Job) -> SinkResult<()>;

    /// Flush buffered output. Called once after the last write.
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
