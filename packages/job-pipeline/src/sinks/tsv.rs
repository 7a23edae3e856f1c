//! Tab-separated file sink.
//!
//! One header row, one row per job. Reopening an existing file appends and
//! skips any `(source, id)` already present, so re-running a pipeline never
//! duplicates rows.

use async_trait::async_trait;
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

/// Column order of the output file.
pub const TSV_COLUMNS: [&str; 13] = [
    "ID",
    "Source",
    "Title",
    "Company",
    "Location",
    "Date",
    "Salary",
    "Salary_Lower",
    "Salary_Upper",
    "Summary",
    "Description",
    "URL",
    "Fit",
];

struct TsvState {
    writer: BufWriter<File>,
    keys: HashSet<JobKey>,
}

/// Appends jobs to a TSV file.
pub struct TsvSink {
    path: PathBuf,
    state: Mutex<TsvState>,
}

impl TsvSink {
    /// Open (or create) the file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> SinkResult<Self> {
        let path = path.into();

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let keys: HashSet<JobKey> = existing.lines().skip(1).filter_map(parse_key).collect();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut writer = BufWriter::new(file);

        if existing.trim().is_empty() {
            writer.write_all(header().as_bytes()).await?;
        } else if !existing.ends_with('\n') {
            writer.write_all(b"\n").await?;
        }

        debug!(path = %path.display(), existing = keys.len(), "Opened TSV sink");

        Ok(Self {
            path,
            state: Mutex::new(TsvState { writer, keys }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JobSink for TsvSink {
    fn name(&self) -> &str {
        "tsv"
    }

    async fn write(&self, job: &Job) -> SinkResult<()> {
        let mut state = self.state.lock().await;
        let key = job.key();
        if state.keys.contains(&key) {
            debug!(key = %key, "Job already in TSV, skipping");
            return Ok(());
        }

        state.writer.write_all(row(job).as_bytes()).await?;
        state.keys.insert(key);
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.state.lock().await.writer.flush().await?;
        Ok(())
    }
}

fn header() -> String {
    let mut line = TSV_COLUMNS.join("\t");
    line.push('\n');
    line
}

fn row(job: &Job) -> String {
    let optional = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
    let fields = [
        escape(&job.id),
        escape(&job.source),
        escape(&job.title),
        escape(&job.company),
        escape(&job.location),
        escape(&job.date),
        escape(&job.salary),
        optional(job.salary_lower),
        optional(job.salary_upper),
        escape(&job.summary),
        escape(&job.description),
        escape(&job.url),
        job.fit.map(|f| f.to_string()).unwrap_or_default(),
    ];

    let mut line = fields.join("\t");
    line.push('\n');
    line
}

fn parse_key(line: &str) -> Option<JobKey> {
    let mut columns = line.split('\t');
    let id = columns.next().filter(|s| !s.is_empty())?;
    let source = columns.next()?;
    Some(JobKey::new(unescape(source), unescape(id)))
}

/// Escape characters that would break the row structure.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
