//! JSON-lines file sink.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::SinkResult;
use crate::traits::sink::JobSink;
use crate::types::job::{Job, JobKey};

struct JsonLinesState {
    writer: BufWriter<File>,
    keys: HashSet<JobKey>,
}

/// Appends one JSON object per job. Keys already in the file are skipped.
pub struct JsonLinesSink {
    path: PathBuf,
    state: Mutex<JsonLinesState>,
}

impl JsonLinesSink {
    /// Open (or create) the file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> SinkResult<Self> {
        let path = path.into();

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let keys: HashSet<JobKey> = existing.lines().filter_map(parse_key).collect();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut writer = BufWriter::new(file);
        if !existing.is_empty() && !existing.ends_with('\n') {
            writer.write_all(b"\n").await?;
        }

        debug!(path = %path.display(), existing = keys.len(), "Opened JSON-lines sink");

        Ok(Self {
            path,
            state: Mutex::new(JsonLinesState { writer, keys }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_key(line: &str) -> Option<JobKey> {
    let value: Value = serde_json::from_str(line).ok()?;
    let source = value.get("source")?.as_str()?;
    let id = value.get("id")?.as_str()?;
    Some(JobKey::new(source, id))
}

#[async_trait]
impl JobSink for JsonLinesSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        let key = job.key();
        if state.keys.contains(&key) {
            return Ok(());
        }

        let mut line = serde_json::to_string(job)?;
        line.push('\n');
        state.writer.write_all(line.as_bytes()).await?;
        state.keys.insert(key);
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.state.lock().await.writer.flush().await?;
        Ok(())
    }
}
