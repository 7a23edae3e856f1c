//! The canonical job record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::raw::RawJob;
use super::summary::JobSummary;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const UNKNOWN_DATE: &str = "Unknown Date";
pub const UNKNOWN_SALARY: &str = "Unknown Salary";

/// Persistence identity of a job: `(source, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub source: String,
    pub id: String,
}

impl JobKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

/// A complete, summarized job listing.
///
/// Jobs only exist once a summarizer has succeeded; missing AI fields carry
/// defaults. Salary bounds stay `None` when unknown and are only coerced to 0
/// for sorting and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Posting date as reported by the board (opaque)
    pub date: String,
    pub url: String,
    /// Free-text salary
    pub salary: String,
    pub salary_lower: Option<i64>,
    pub salary_upper: Option<i64>,
    /// Cleaned description
    pub description: String,
    /// AI-generated summary
    pub summary: String,
    /// Relevance score against the configured profile
    pub fit: Option<i32>,
}

impl Job {
    /// Create a job with default descriptive fields.
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            title: UNKNOWN_TITLE.to_string(),
            company: UNKNOWN_COMPANY.to_string(),
            location: UNKNOWN_LOCATION.to_string(),
            date: UNKNOWN_DATE.to_string(),
            url: String::new(),
            salary: UNKNOWN_SALARY.to_string(),
            salary_lower: None,
            salary_upper: None,
            description: String::new(),
            summary: String::new(),
            fit: None,
        }
    }

    /// Promote a summarizer result to a job.
    ///
    /// Id precedence: summarizer id, then source-assigned id, then a hash of
    /// the listing URL (or content when the URL is blank).
    pub fn from_summary(raw: &RawJob, summary: JobSummary) -> Self {
        let id = summary
            .id
            .or_else(|| raw.id.clone().filter(|id| !id.trim().is_empty()))
            .unwrap_or_else(|| {
                if raw.url.trim().is_empty() {
                    derive_id(&raw.content)
                } else {
                    derive_id(&raw.url)
                }
            });

        Self {
            id,
            source: raw.source.clone(),
            title: summary.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            company: summary.company.unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
            location: summary
                .location
                .unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
            date: summary.date.unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            url: summary.url.unwrap_or_else(|| raw.url.clone()),
            salary: summary.salary.unwrap_or_else(|| UNKNOWN_SALARY.to_string()),
            salary_lower: summary.salary_lower,
            salary_upper: summary.salary_upper,
            description: summary.description.unwrap_or_default(),
            summary: summary.summary.unwrap_or_default(),
            fit: summary.fit,
        }
    }

    /// Persistence key.
    pub fn key(&self) -> JobKey {
        JobKey::new(&self.source, &self.id)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set both salary bounds.
    pub fn with_salary_range(mut self, lower: Option<i64>, upper: Option<i64>) -> Self {
        self.salary_lower = lower;
        self.salary_upper = upper;
        self
    }

    pub fn with_fit(mut self, fit: i32) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Stable 16-hex-char id derived from a URL or content.
pub fn derive_id(input: &str) -> String {
    let digest = Sha256::digest(input.trim().as_bytes());
    hex::encode(&digest[..8])
}
