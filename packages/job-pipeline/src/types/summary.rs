//! Structured fields returned by a summarizer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::salary::deserialize_amount;

/// AI-extracted fields for one listing.
///
/// Every field is optional: `None` means the summarizer ran but could not
/// determine the value. Defaults are substituted when the summary is promoted
/// to a [`Job`](super::job::Job).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(default, alias = "linkedin_id", deserialize_with = "deserialize_text")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub company: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub location: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub url: Option<String>,

    /// Human-readable salary text
    #[serde(default, deserialize_with = "deserialize_text")]
    pub salary: Option<String>,

    #[serde(default, deserialize_with = "deserialize_amount")]
    pub salary_lower: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_amount")]
    pub salary_upper: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "deserialize_text")]
    pub summary: Option<String>,

    /// Relevance score against the configured profile
    #[serde(default, deserialize_with = "deserialize_fit")]
    pub fit: Option<i32>,
}

impl JobSummary {
    /// Whether either salary bound is known.
    pub fn has_salary(&self) -> bool {
        self.salary_lower.is_some() || self.salary_upper.is_some()
    }
}

/// Strings pass through, numbers are stringified, blanks and nulls are unknown.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_fit<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i32),
        _ => None,
    })
}
