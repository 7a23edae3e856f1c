//! Multi-Source Job Listing Pipeline
//!
//! Fetches job listings from several boards, turns each raw listing into a
//! structured [`Job`] with an AI summarizer, then de-duplicates, sorts and
//! writes the result to one or more sinks.
//!
//! # Design Philosophy
//!
//! - Collaborators behind traits: sources, summarizer, sinks, sorter
//! - One retry controller for every remote call
//! - Failures stay local: a bad source or listing never aborts the run
//! - Every run ends with a report saying what was dropped and why
//!
//! # Usage
//!
//! ```rust,ignore
//! use job_pipeline::{Pipeline, PipelineConfig, TsvSink};
//! use job_pipeline::testing::{MockSource, MockSummarizer};
//!
//! let pipeline = Pipeline::builder()
//!     .source(MockSource::new("board").with_listings(10))
//!     .summarizer(MockSummarizer::new())
//!     .sink(TsvSink::open("jobs.tsv").await?)
//!     .config(PipelineConfig::new().with_dev_mode(2))
//!     .build()?;
//!
//! let report = pipeline.run().await;
//! println!("{report}");
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator contracts (JobSource, Summarizer, JobSink)
//! - [`types`] - Jobs, raw blobs, summaries, salary parsing, config
//! - [`retry`] - Retry controller with exponential backoff
//! - [`pipeline`] - Orchestrator, sorting and run reports
//! - [`sources`] - HTTP job board source
//! - [`summarizers`] - OpenAI summarizer and output parsing
//! - [`sinks`] - TSV, JSON lines, log, memory and database sinks
//! - [`plan`] - Statically validated step plans over registered tools
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod plan;
pub mod retry;
pub mod sinks;
pub mod sources;
pub mod summarizers;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{PipelineError, PlanError, SinkError, SourceError, SummarizeError};
pub use retry::{RetryError, RetryPolicy, Retryable};
pub use traits::{
    sink::JobSink,
    source::JobSource,
    summarizer::{InputDetail, Summarizer},
};
pub use types::{
    config::PipelineConfig,
    job::{Job, JobKey},
    raw::RawJob,
    salary::currency_to_int,
    summary::JobSummary,
};

pub use pipeline::{
    DropStage, DroppedItem, FieldSorter, JobSorter, Pipeline, PipelineBuilder, RunOutcome,
    RunReport, SinkReport, SortKey, SortOrder, SourceReport,
};

pub use plan::{execute_plan, Binding, Plan, PlanStep, Tool, ToolRegistry};

pub use sources::{Credentials, HttpJobSource, HttpSession, HttpSessionConfig, HttpSourceConfig};

#[cfg(feature = "openai")]
pub use summarizers::OpenAiSummarizer;
pub use summarizers::parse_summary;

pub use sinks::{JsonLinesSink, LogSink, MemorySink, TsvSink};

#[cfg(feature = "sqlite")]
pub use sinks::SqliteSink;

#[cfg(feature = "postgres")]
pub use sinks::PostgresSink;

pub use testing::{ConcurrencyGauge, FailingSink, MockFailure, MockSource, MockSummarizer};
