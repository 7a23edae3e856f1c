//! Ordering of the final job set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::job::Job;

/// Orders a job collection. Implementations must be deterministic and must
/// not reorder jobs with equal keys.
pub trait JobSorter: Send + Sync {
    fn sort(&self, jobs: &[Job]) -> Vec<Job>;
}

/// Field to sort on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    SalaryUpper,
    SalaryLower,
    Fit,
    Title,
    Company,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Stable sort on one job field. Unknown numeric values sort as 0.
///
/// The default is `salary_upper` descending, so listings without a salary
/// fall to the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSorter {
    pub key: SortKey,
    pub order: SortOrder,
}

impl FieldSorter {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Highest `salary_upper` first.
    pub fn salary_desc() -> Self {
        Self::default()
    }

    fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let ordering = match self.key {
            SortKey::SalaryUpper => a.salary_upper.unwrap_or(0).cmp(&b.salary_upper.unwrap_or(0)),
            SortKey::SalaryLower => a.salary_lower.unwrap_or(0).cmp(&b.salary_lower.unwrap_or(0)),
            SortKey::Fit => a.fit.unwrap_or(0).cmp(&b.fit.unwrap_or(0)),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Company => a.company.to_lowercase().cmp(&b.company.to_lowercase()),
        };

        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

impl JobSorter for FieldSorter {
    fn sort(&self, jobs: &[Job]) -> Vec<Job> {
        let mut sorted = jobs.to_vec();
        // sort_by is stable
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted
    }
}
