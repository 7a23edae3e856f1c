//! Sink that logs each job. Handy for dry runs.

use async_trait::async_trait;
use tracing::info;

use crate::error::SinkResult;
use crate::traits::sink::JobSink;
use crate::types::job::Job;
use crate::types::salary::display_amount;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        info!(
            source = %job.source,
            id = %job.id,
            title = %job.title,
            company = %job.company,
            location = %job.location,
            salary = %format!(
                "{} ({}-{})",
                job.salary,
                display_amount(job.salary_lower),
                display_amount(job.salary_upper)
            ),
            fit = job.fit.unwrap_or(0),
            url = %job.url,
            "Job"
        );
        Ok(())
    }
}
