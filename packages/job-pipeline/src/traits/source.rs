//! Source trait for pluggable job boards.
//!
//! A source fetches one board's listing pages and extracts a raw blob per
//! listing. Page retrieval, session handling and markup parsing all live
//! behind this boundary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use job_pipeline::traits::source::JobSource;
//!
//! let blobs = source.fetch_and_extract().await?;
//! for raw in &blobs {
//!     println!("{} {}", source.name(), raw.url);
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::types::raw::RawJob;

/// A job board adapter.
///
/// Implementations must be safe to share across tasks; the pipeline calls
/// `fetch_and_extract` again when a retryable error is returned.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Stable identifier, recorded as `Job::source`.
    fn name(&self) -> &str;

    /// Fetch the board and extract one raw blob per listing.
    ///
    /// Return a retryable [`SourceError`](crate::error::SourceError) for
    /// transient failures (429, 5xx, timeouts) and a fatal one for bad
    /// credentials or configuration.
    async fn fetch_and_extract(&self) -> SourceResult<Vec<RawJob>>;
}

#[async_trait]
impl<S: JobSource + ?Sized> JobSource for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch_and_extract(&self) -> SourceResult<Vec<RawJob>> {
        (**self).fetch_and_extract().await
    }
}
