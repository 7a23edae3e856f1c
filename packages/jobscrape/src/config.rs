//! Application configuration loaded from a TOML file plus the environment.

use anyhow::{bail, Context, Result};
use job_pipeline::{
    Credentials, HttpSessionConfig, HttpSourceConfig, PipelineConfig, RetryPolicy, SortKey,
    SortOrder,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `jobscrape.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub pipeline: PipelineSection,
    pub http: HttpSection,
    pub ai: AiSection,
    pub sources: Vec<SourceSection>,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub dev_mode: bool,
    pub dev_mode_job_limit: usize,
    pub max_workers: usize,
    pub summarize_concurrency: usize,
    pub retry_on_missing_salary: bool,
    pub fetch_attempts: u32,
    pub summarize_attempts: u32,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            dev_mode: defaults.dev_mode,
            dev_mode_job_limit: defaults.dev_mode_job_limit,
            max_workers: defaults.max_workers,
            summarize_concurrency: defaults.summarize_concurrency,
            retry_on_missing_salary: defaults.retry_on_missing_salary,
            fetch_attempts: defaults.fetch_retry.max_attempts,
            summarize_attempts: defaults.summarize_retry.max_attempts,
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PipelineSection {
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            dev_mode: self.dev_mode,
            dev_mode_job_limit: self.dev_mode_job_limit,
            max_workers: self.max_workers,
            summarize_concurrency: self.summarize_concurrency,
            retry_on_missing_salary: self.retry_on_missing_salary,
            fetch_retry: RetryPolicy::default().with_max_attempts(self.fetch_attempts),
            summarize_retry: RetryPolicy::summarize().with_max_attempts(self.summarize_attempts),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
    /// 0 disables rate limiting
    pub requests_per_second: u32,
    pub burst: Option<u32>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 30,
            requests_per_second: 2,
            burst: None,
        }
    }
}

impl HttpSection {
    pub fn to_session_config(&self) -> HttpSessionConfig {
        let mut config =
            HttpSessionConfig::default().with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        config = match self.requests_per_second {
            0 => config.without_rate_limit(),
            rps => config.with_rate_limit(rps),
        };
        if let Some(burst) = self.burst {
            config = config.with_burst(burst);
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiSection {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub prompt_file: Option<PathBuf>,
    pub profile_file: Option<PathBuf>,
    pub base_url: Option<String>,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.2),
            max_tokens: 1500,
            prompt_file: None,
            profile_file: None,
            base_url: None,
        }
    }
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub name: String,
    pub url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub link_pattern: Option<String>,
    #[serde(default)]
    pub max_listings: Option<usize>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl SourceSection {
    /// Credentials from the file, overridden by `<NAME>_USERNAME` and
    /// `<NAME>_PASSWORD` from `env`.
    pub fn credentials(&self, env: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
        let prefix = env_prefix(&self.name);
        let username = env(&format!("{prefix}_USERNAME")).or_else(|| self.username.clone())?;
        let password = env(&format!("{prefix}_PASSWORD")).or_else(|| self.password.clone());
        Some(Credentials::new(username, password))
    }

    pub fn to_source_config(&self, env: impl Fn(&str) -> Option<String>) -> HttpSourceConfig {
        let mut config = HttpSourceConfig::new(&self.name, &self.url);
        if let Some(pattern) = &self.link_pattern {
            config = config.with_link_pattern(pattern);
        }
        if let Some(max) = self.max_listings {
            config = config.with_max_listings(max);
        }
        if let Some(credentials) = self.credentials(env) {
            config = config.with_credentials(credentials);
        }
        config
    }
}

/// `Indeed Jobs` → `INDEED_JOBS`
pub fn env_prefix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub tsv: Option<PathBuf>,
    pub jsonl: Option<PathBuf>,
    /// SQLite connection string, e.g. `sqlite://jobs.db?mode=rwc`
    pub sqlite: Option<String>,
    /// Write to Postgres at `DATABASE_URL`
    pub postgres: bool,
    /// Log every job at debug level
    pub log: bool,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            tsv: Some(PathBuf::from("jobs.tsv")),
            jsonl: None,
            sqlite: None,
            postgres: false,
            log: false,
        }
    }
}

impl AppConfig {
    /// Load and validate the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (index, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                bail!("sources[{index}] has an empty name");
            }
            if source.url.trim().is_empty() {
                bail!("source '{}' has an empty url", source.name);
            }
        }
        Ok(())
    }

    /// Sources with `enabled = true`.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceSection> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [pipeline]
        dev_mode = true
        dev_mode_job_limit = 3
        sort_by = "fit"

        [http]
        requests_per_second = 0

        [ai]
        model = "gpt-4o"

        [[sources]]
        name = "remote board"
        url = "https://remote.example.com/jobs?q=rust"
        link_pattern = "/jobs/(\\d+)"
        username = "file-user"

        [[sources]]
        name = "disabled"
        url = "https://off.example.com"
        enabled = false

        [output]
        jsonl = "jobs.jsonl"
        log = true
    "#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::parse(SAMPLE).unwrap();

        let pipeline = config.pipeline.to_pipeline_config();
        assert_eq!(pipeline.job_cap(), Some(3));
        assert_eq!(pipeline.summarize_retry.max_attempts, 5);
        assert_eq!(config.pipeline.sort_by, SortKey::Fit);
        assert_eq!(config.pipeline.sort_order, SortOrder::Descending);

        assert_eq!(config.http.to_session_config().requests_per_second, None);
        assert_eq!(config.ai.model, "gpt-4o");
        assert_eq!(config.ai.temperature, Some(0.2));

        let enabled: Vec<&str> = config.enabled_sources().map(|s| s.name.as_str()).collect();
        assert_eq!(enabled, vec!["remote board"]);

        assert_eq!(config.output.tsv, Some(PathBuf::from("jobs.tsv")));
        assert_eq!(config.output.jsonl, Some(PathBuf::from("jobs.jsonl")));
        assert!(config.output.log);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.pipeline.to_pipeline_config(), PipelineConfig::default());
        assert_eq!(config.http.to_session_config().requests_per_second, Some(2));
    }

    #[test]
    fn test_env_overrides_credentials() {
        let config = AppConfig::parse(SAMPLE).unwrap();
        let source = &config.sources[0];

        let env: HashMap<&str, &str> = HashMap::from([("REMOTE_BOARD_PASSWORD", "hunter2")]);
        let credentials = source
            .credentials(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(credentials.username, "file-user");
        assert_eq!(credentials.password.as_deref(), Some("hunter2"));

        assert!(config.sources[1].credentials(|_| None).is_none());
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(AppConfig::parse("[pipeline]\nmax_wrokers = 2").is_err());
        assert!(AppConfig::parse("[[sources]]\nname = \"\"\nurl = \"https://x\"").is_err());
        assert!(AppConfig::parse("[[sources]]\nname = \"a\"").is_err());
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("Indeed Jobs"), "INDEED_JOBS");
        assert_eq!(env_prefix("we-work-remotely"), "WE_WORK_REMOTELY");
    }
}
