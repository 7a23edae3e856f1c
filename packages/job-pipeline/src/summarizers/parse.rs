//! Lenient parsing of model output into a [`JobSummary`].

use serde_json::Value;

use crate::error::SummarizeError;
use crate::types::summary::JobSummary;

/// Parse a model response into a job summary.
///
/// Tolerates code fences, stray back-ticks and prose around the object:
/// everything before the first `{` and after the last `}` is dropped.
pub fn parse_summary(response: &str) -> Result<JobSummary, SummarizeError> {
    let value = match serde_json::from_str::<Value>(response.trim()) {
        Ok(value) if value.is_object() => value,
        _ => {
            let json =
                extract_json_object(response).ok_or_else(|| SummarizeError::MalformedOutput {
                    reason: "no JSON object in response".into(),
                })?;
            serde_json::from_str(json).map_err(|e| SummarizeError::MalformedOutput {
                reason: format!("invalid JSON: {e}"),
            })?
        }
    };

    serde_json::from_value(value).map_err(|e| SummarizeError::MalformedOutput {
        reason: format!("unexpected job record shape: {e}"),
    })
}

/// Slice from the first `{` to the last `}`.
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let summary = parse_summary(r#"{"title": "Rust Engineer", "salary_upper": "$180k"}"#).unwrap();
        assert_eq!(summary.title.as_deref(), Some("Rust Engineer"));
        assert_eq!(summary.salary_upper, Some(180_000));
    }

    #[test]
    fn test_fenced_json_with_prose() {
        let response = "Here is the job:\n```json\n{\"company\": \"Acme\", \"fit\": 8}\n```\nLet me know!";
        let summary = parse_summary(response).unwrap();
        assert_eq!(summary.company.as_deref(), Some("Acme"));
        assert_eq!(summary.fit, Some(8));
    }

    #[test]
    fn test_malformed_output() {
        assert!(matches!(
            parse_summary("Sorry, I can't help with that."),
            Err(SummarizeError::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_summary("{\"title\": "),
            Err(SummarizeError::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_summary("} backwards {"),
            Err(SummarizeError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        assert!(parse_summary("[1, 2, 3]").is_err());
    }
}
