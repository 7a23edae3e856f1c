//! Pipeline orchestration.

pub mod orchestrator;
pub mod report;
pub mod sort;
pub(crate) mod summarize;

pub use orchestrator::{Pipeline, PipelineBuilder};
pub use report::{DropStage, DroppedItem, RunOutcome, RunReport, SinkReport, SourceReport};
pub use sort::{FieldSorter, JobSorter, SortKey, SortOrder};
