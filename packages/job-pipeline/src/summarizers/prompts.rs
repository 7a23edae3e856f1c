//! Prompts for job summarization.

/// Built-in system prompt describing the expected JSON record.
pub const JOB_SUMMARY_PROMPT: &str = r#"You extract structured data from a single job posting.

Respond with one JSON object and nothing else. Use these fields:
{
    "id": "the board's job id if visible, else null",
    "title": "job title",
    "company": "hiring company",
    "location": "city/region, or Remote",
    "date": "posting date as shown",
    "url": "canonical job URL if visible, else null",
    "salary": "salary as written in the posting",
    "salary_lower": "lower bound as a plain annual number, else null",
    "salary_upper": "upper bound as a plain annual number, else null",
    "description": "cleaned description of the role, responsibilities and requirements",
    "summary": "2-3 sentence summary of the role",
    "fit": "integer 1-10 rating how well the candidate profile fits, else null"
}

Use null for anything the posting does not state. Do not guess salaries."#;

/// Build the user message for one posting.
pub fn format_job_input(url: &str, content: &str, profile: Option<&str>) -> String {
    let profile_section = match profile {
        Some(profile) if !profile.trim().is_empty() => {
            format!("Candidate profile (use it to score \"fit\"):\n{}\n\n", profile.trim())
        }
        _ => String::new(),
    };

    format!("{profile_section}Job URL: {url}\nJob posting:\n{content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_job_input_with_profile() {
        let input = format_job_input("https://x/1", "Rust role", Some("10 years of Rust"));
        assert!(input.starts_with("Candidate profile"));
        assert!(input.contains("10 years of Rust"));
        assert!(input.ends_with("Job posting:\nRust role"));
    }

    #[test]
    fn test_format_job_input_without_profile() {
        let input = format_job_input("https://x/1", "Rust role", Some("   "));
        assert!(input.starts_with("Job URL: https://x/1"));
    }
}
