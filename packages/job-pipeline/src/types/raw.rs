//! Raw job blobs produced by sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::summarizer::InputDetail;

/// One listing as fetched, before AI structuring.
///
/// Raw content only lives here; it is never copied onto the persisted
/// [`Job`](super::job::Job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJob {
    /// Name of the source that produced this blob
    pub source: String,

    /// Source-assigned listing id, if the board exposes one
    pub id: Option<String>,

    /// Listing URL
    pub url: String,

    /// Unprocessed page content (usually HTML)
    pub content: String,

    /// Cleaned, human-readable rendering of `content`
    pub text: Option<String>,

    /// When the blob was fetched
    pub fetched_at: DateTime<Utc>,

    /// Source-specific extras
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RawJob {
    /// Create a new raw blob.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            id: None,
            url: url.into(),
            content: content.into(),
            text: None,
            fetched_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Set the source-assigned id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the cleaned text rendering.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a metadata key-value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Content to send to a summarizer at the given detail level.
    ///
    /// `Standard` prefers the cleaned text; `Full` is the raw content.
    pub fn input(&self, detail: InputDetail) -> &str {
        match detail {
            InputDetail::Standard => self
                .text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(&self.content),
            InputDetail::Full => &self.content,
        }
    }

    /// Whether there is anything to summarize at all.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_detail() {
        let raw = RawJob::new("board", "https://jobs.example.com/1", "<p>Rust dev</p>")
            .with_text("Rust dev");

        assert_eq!(raw.input(InputDetail::Standard), "Rust dev");
        assert_eq!(raw.input(InputDetail::Full), "<p>Rust dev</p>");
    }

    #[test]
    fn test_standard_falls_back_to_content() {
        let raw = RawJob::new("board", "u", "<p>x</p>").with_text("   ");
        assert_eq!(raw.input(InputDetail::Standard), "<p>x</p>");
        assert!(!raw.is_empty());
        assert!(RawJob::new("board", "u", " ").is_empty());
    }
}
