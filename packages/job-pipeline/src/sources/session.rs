//! Shared, rate-limited HTTP session.
//!
//! Built once at startup and shared by `Arc` across every source. The
//! session itself is immutable; the governor limiter is the only state and
//! it is internally synchronised.

use governor::{Quota, RateLimiter};
use reqwest::{header, Client, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{SourceError, SourceResult};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Settings for the shared HTTP session.
#[derive(Debug, Clone)]
pub struct HttpSessionConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Sustained request rate across all sources; `None` disables limiting
    pub requests_per_second: Option<u32>,
    /// Burst allowance on top of the sustained rate
    pub burst: Option<u32>,
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; JobScrape/0.1)".to_string(),
            timeout: Duration::from_secs(30),
            requests_per_second: Some(2),
            burst: None,
        }
    }
}

impl HttpSessionConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = Some(burst);
        self
    }

    pub fn without_rate_limit(mut self) -> Self {
        self.requests_per_second = None;
        self
    }
}

/// Basic-auth credentials for a source.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// HTTP client plus request limiter shared by all sources.
pub struct HttpSession {
    client: Client,
    user_agent: String,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl HttpSession {
    /// Build a session.
    pub fn new(config: HttpSessionConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let limiter = match config.requests_per_second {
            Some(rps) => {
                let rps = NonZeroU32::new(rps).ok_or_else(|| SourceError::InvalidConfig {
                    reason: "requests_per_second must be > 0".into(),
                })?;
                let mut quota = Quota::per_second(rps);
                if let Some(burst) = config.burst.and_then(NonZeroU32::new) {
                    quota = quota.allow_burst(burst);
                }
                Some(Arc::new(RateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            client,
            user_agent: config.user_agent,
            limiter,
        })
    }

    /// Use a preconfigured client (proxies, custom TLS).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET `url` and return the body text.
    ///
    /// Waits for the shared limiter first. Non-success statuses become typed
    /// [`SourceError`]s so the retry controller can classify them.
    pub async fn get_text(
        &self,
        url: &Url,
        credentials: Option<&Credentials>,
    ) -> SourceResult<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        debug!(url = %url, "HTTP fetch starting");

        let mut request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, &self.user_agent);
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            map_transport_error(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            warn!(url = %url, status = %status, "HTTP error status");
            return Err(status_error(status, url, retry_after));
        }

        response.text().await.map_err(|e| map_transport_error(url, e))
    }
}

fn map_transport_error(url: &Url, error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout {
            url: url.to_string(),
        }
    } else {
        SourceError::Network(Box::new(error))
    }
}

/// Map a non-success status to a source error.
pub(crate) fn status_error(
    status: StatusCode,
    url: &Url,
    retry_after: Option<Duration>,
) -> SourceError {
    let url = url.to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { url, retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Auth { url },
        _ => SourceError::Status {
            status: status.as_u16(),
            url,
        },
    }
}

/// Parse a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Retryable;

    fn url() -> Url {
        Url::parse("https://jobs.example.com/search").unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let limited = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            &url(),
            Some(Duration::from_secs(5)),
        );
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(5)));

        let unavailable = status_error(StatusCode::SERVICE_UNAVAILABLE, &url(), None);
        assert!(unavailable.is_retryable());

        let forbidden = status_error(StatusCode::FORBIDDEN, &url(), None);
        assert!(matches!(forbidden, SourceError::Auth { .. }));
        assert!(!forbidden.is_retryable());

        let gone = status_error(StatusCode::GONE, &url(), None);
        assert!(!gone.is_retryable());
    }

    #[test]
    fn test_session_rejects_zero_rate() {
        let config = HttpSessionConfig::default().with_rate_limit(0);
        assert!(matches!(
            HttpSession::new(config),
            Err(SourceError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("me", Some("hunter2".into()));
        let debug = format!("{creds:?}");
        assert!(debug.contains("me"));
        assert!(!debug.contains("hunter2"));
    }
}
