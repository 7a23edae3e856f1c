//! Generic HTTP job board source.
//!
//! Fetches a search page, picks out listing links with a regex and fetches
//! each listing page. Works for boards that render listings server-side;
//! anything needing a browser is out of reach.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::html::{extract_links, extract_title, html_to_text};
use super::session::{Credentials, HttpSession};
use crate::error::{SourceError, SourceResult};
use crate::retry::RetryPolicy;
use crate::traits::source::JobSource;
use crate::types::raw::RawJob;

/// Descriptor for one HTTP board.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Source name, recorded on every job
    pub name: String,

    /// Search or listing page URL
    pub search_url: String,

    /// Regex a link must match to count as a listing.
    ///
    /// If the pattern has a capture group, group 1 is used as the listing id.
    pub link_pattern: Option<String>,

    /// Maximum listing pages fetched per run
    pub max_listings: Option<usize>,

    pub credentials: Option<Credentials>,

    /// Retry policy for each listing page
    pub detail_retry: RetryPolicy,
}

impl HttpSourceConfig {
    pub fn new(name: impl Into<String>, search_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_url: search_url.into(),
            link_pattern: None,
            max_listings: None,
            credentials: None,
            detail_retry: RetryPolicy::http(),
        }
    }

    pub fn with_link_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.link_pattern = Some(pattern.into());
        self
    }

    pub fn with_max_listings(mut self, max: usize) -> Self {
        self.max_listings = Some(max);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_detail_retry(mut self, policy: RetryPolicy) -> Self {
        self.detail_retry = policy;
        self
    }
}

/// A [`JobSource`] backed by plain HTTP fetches.
pub struct HttpJobSource {
    config: HttpSourceConfig,
    session: Arc<HttpSession>,
}

impl HttpJobSource {
    pub fn new(config: HttpSourceConfig, session: Arc<HttpSession>) -> Self {
        Self { config, session }
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Parse the descriptor. Errors are fatal for this source only.
    fn resolve(&self) -> SourceResult<(Url, Option<Regex>)> {
        let search_url =
            Url::parse(&self.config.search_url).map_err(|e| SourceError::InvalidConfig {
                reason: format!(
                    "{}: bad search_url '{}': {e}",
                    self.config.name, self.config.search_url
                ),
            })?;

        let pattern = self
            .config
            .link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| SourceError::InvalidConfig {
                reason: format!("{}: bad link_pattern: {e}", self.config.name),
            })?;

        Ok((search_url, pattern))
    }

    async fn fetch_listing(&self, url: &Url, pattern: Option<&Regex>) -> SourceResult<RawJob> {
        let credentials = self.config.credentials.as_ref();
        let html = self
            .config
            .detail_retry
            .run(|| self.session.get_text(url, credentials))
            .await
            .map_err(|e| e.into_error())?
            .value;

        let mut raw = RawJob::new(&self.config.name, url.as_str(), html.as_str())
            .with_text(html_to_text(&html));
        if let Some(id) = pattern.and_then(|p| listing_id(p, url.as_str())) {
            raw = raw.with_id(id);
        }
        if let Some(title) = extract_title(&html) {
            raw = raw.with_metadata("page_title", title);
        }
        Ok(raw)
    }
}

/// Capture group 1 of `pattern` in `url`, if any.
fn listing_id(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

#[async_trait]
impl JobSource for HttpJobSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch_and_extract(&self) -> SourceResult<Vec<RawJob>> {
        let (search_url, pattern) = self.resolve()?;

        info!(source = %self.config.name, url = %search_url, "Fetching search page");
        let search_html = self
            .session
            .get_text(&search_url, self.config.credentials.as_ref())
            .await?;

        let mut links = extract_links(&search_url, &search_html, pattern.as_ref());
        if let Some(max) = self.config.max_listings {
            links.truncate(max);
        }
        debug!(source = %self.config.name, links = links.len(), "Listing links found");

        let mut blobs = Vec::with_capacity(links.len());
        for link in &links {
            match self.fetch_listing(link, pattern.as_ref()).await {
                Ok(raw) => blobs.push(raw),
                // Bad credentials will not get better on the next listing
                Err(e @ SourceError::Auth { .. }) => return Err(e),
                Err(e) => {
                    warn!(
                        source = %self.config.name,
                        url = %link,
                        error = %e,
                        "Skipping listing page"
                    );
                }
            }
        }

        info!(
            source = %self.config.name,
            listings = blobs.len(),
            skipped = links.len() - blobs.len(),
            "Source fetch complete"
        );
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;
    use crate::sources::session::HttpSessionConfig;

    fn session() -> Arc<HttpSession> {
        Arc::new(HttpSession::new(HttpSessionConfig::default().without_rate_limit()).unwrap())
    }

    #[test]
    fn test_listing_id_from_capture_group() {
        let pattern = Regex::new(r"/jobs/view/(\d+)").unwrap();
        assert_eq!(
            listing_id(&pattern, "https://jobs.example.com/jobs/view/4012/"),
            Some("4012".to_string())
        );

        let no_group = Regex::new(r"/jobs/view/\d+").unwrap();
        assert_eq!(listing_id(&no_group, "https://x/jobs/view/1"), None);
    }

    #[tokio::test]
    async fn test_bad_search_url_is_fatal_config_error() {
        let source = HttpJobSource::new(HttpSourceConfig::new("broken", "not a url"), session());

        let err = source.fetch_and_extract().await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidConfig { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_bad_link_pattern_is_fatal_config_error() {
        let config = HttpSourceConfig::new("broken", "https://jobs.example.com/search")
            .with_link_pattern("(unclosed");
        let source = HttpJobSource::new(config, session());

        let err = source.fetch_and_extract().await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidConfig { .. }));
    }

    #[test]
    fn test_config_builder() {
        let config = HttpSourceConfig::new("board", "https://jobs.example.com")
            .with_link_pattern(r"/view/(\d+)")
            .with_max_listings(25)
            .with_credentials(Credentials::new("me", None));

        assert_eq!(config.max_listings, Some(25));
        assert_eq!(config.detail_retry, RetryPolicy::http());
        assert!(config.credentials.is_some());
    }
}
