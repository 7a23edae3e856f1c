//! In-memory sink for testing and embedding.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::SinkResult;
use crate::traits::sink::JobSink;
use crate::types::job::{Job, JobKey};

#[derive(Default)]
struct MemoryState {
    jobs: Vec<Job>,
    keys: HashSet<JobKey>,
    flushes: usize,
}

/// Collects jobs in memory, one record per `(source, id)`.
///
/// Clones share the same storage, so a test can keep a handle while the
/// pipeline owns another.
#[derive(Clone)]
pub struct MemorySink {
    name: String,
    state: Arc<RwLock<MemoryState>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Jobs in write order.
    pub fn jobs(&self) -> Vec<Job> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .clone()
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .jobs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .contains(key)
    }

    /// Number of times `flush` was called.
    pub fn flush_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .flushes
    }
}

#[async_trait]
impl JobSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.keys.insert(job.key()) {
            state.jobs.push(job.clone());
        }
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .flushes += 1;
        Ok(())
    }
}
