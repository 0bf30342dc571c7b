//! Authenticated JSON client shared by the provider adapters.
//!
//! Handles provider auth headers, `Link` pagination headers and rate-limit
//! responses (429, or 403 with an exhausted quota), which are retried with
//! exponential backoff before surfacing as [`ConnectorError::RateLimited`].

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use rand::{Rng, thread_rng};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::RateLimitPolicyConfig;
use crate::connectors::ConnectorError;

pub const USER_AGENT: &str = concat!("changefeed/", env!("CARGO_PKG_VERSION"));

/// Build the `reqwest` client an adapter reuses for every run.
pub fn build_http_client(
    timeout: Duration,
    accept: &'static str,
) -> Result<reqwest::Client, ConnectorError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| ConnectorError::configuration(format!("failed to build HTTP client: {e}")))
}

/// How a request proves its identity to the provider.
#[derive(Clone)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// GitLab `PRIVATE-TOKEN: <token>`
    PrivateToken(String),
    Basic { username: String, password: String },
}

impl AuthScheme {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthScheme::Bearer(token) => request.bearer_auth(token),
            AuthScheme::PrivateToken(token) => request.header("PRIVATE-TOKEN", token),
            AuthScheme::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            AuthScheme::PrivateToken(_) => f.write_str("PrivateToken([REDACTED])"),
            AuthScheme::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Effective rate-limit backoff settings for one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base_seconds: f64,
    pub max_seconds: f64,
    pub jitter_factor: f64,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Global policy with the provider's overrides applied.
    pub fn for_provider(config: &RateLimitPolicyConfig, provider: &str) -> Self {
        let policy = config.provider_overrides.get(provider);

        Self {
            base_seconds: policy
                .and_then(|p| p.base_seconds)
                .unwrap_or(config.base_seconds) as f64,
            max_seconds: policy
                .and_then(|p| p.max_seconds)
                .unwrap_or(config.max_seconds) as f64,
            jitter_factor: policy
                .and_then(|p| p.jitter_factor)
                .unwrap_or(config.jitter_factor),
            max_retries: policy
                .and_then(|p| p.max_retries)
                .unwrap_or(config.max_retries),
        }
    }

    /// Delay before retry number `attempt` (zero based).
    ///
    /// The larger of the server hint and `base * 2^attempt`, capped at
    /// `max_seconds`, plus up to `jitter_factor` of itself.
    pub fn backoff(&self, attempt: u32, hint_seconds: Option<u64>) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut backoff = (self.base_seconds * 2_f64.powi(exponent)).min(self.max_seconds);
        if let Some(hint) = hint_seconds {
            backoff = backoff.max(hint as f64).min(self.max_seconds);
        }

        let jitter_range = self.jitter_factor * backoff;
        if jitter_range > 0.0 {
            backoff += thread_rng().gen_range(0.0..jitter_range);
        }

        Duration::from_secs_f64(backoff.max(0.0))
    }
}

/// One decoded response page plus the `rel="next"` URL, if any.
#[derive(Debug)]
pub struct Page<T> {
    pub body: T,
    pub next: Option<Url>,
}

/// Provider API client bound to one base URL and credential.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    provider: &'static str,
    base_url: Url,
    auth: AuthScheme,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        http: reqwest::Client,
        provider: &'static str,
        base_url: &str,
        auth: AuthScheme,
        retry: RetryPolicy,
    ) -> Result<Self, ConnectorError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            ConnectorError::configuration(format!("invalid {provider} API base '{base_url}': {e}"))
        })?;

        Ok(Self {
            http,
            provider,
            base_url,
            auth,
            retry,
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `path` under the base URL, with `query` appended.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ConnectorError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ConnectorError::configuration(format!("invalid request URL '{joined}': {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ConnectorError> {
        let response = self.send_with_retry(url).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn get_page<T: DeserializeOwned>(&self, url: Url) -> Result<Page<T>, ConnectorError> {
        let response = self.send_with_retry(url).await?;
        let next = next_link(response.headers());
        let body = response.json::<T>().await?;
        Ok(Page { body, next })
    }

    /// GET `url`, sleeping through rate-limit responses up to the retry budget.
    pub async fn send_with_retry(&self, url: Url) -> Result<reqwest::Response, ConnectorError> {
        let mut attempt = 0;

        loop {
            debug!(provider = self.provider, url = %url, attempt, "GET");
            let response = self.auth.apply(self.http.get(url.clone())).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if is_rate_limited(status, response.headers()) {
                let hint = rate_limit_hint(response.headers());
                counter!("changefeed_rate_limited_total", "provider" => self.provider)
                    .increment(1);

                if attempt >= self.retry.max_retries {
                    warn!(
                        provider = self.provider,
                        url = %url,
                        retries = attempt,
                        "Rate limit persisted after retries"
                    );
                    return Err(ConnectorError::RateLimited { retry_after: hint });
                }

                let delay = self.retry.backoff(attempt, hint);
                warn!(
                    provider = self.provider,
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                return Err(ConnectorError::Authentication {
                    details: format!("{} rejected the credential: {}", self.provider, body),
                });
            }

            return Err(ConnectorError::Http {
                status: status.as_u16(),
                body,
            });
        }
    }
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && header_str(headers, "X-RateLimit-Remaining").is_some_and(|v| v.trim() == "0")
}

/// Seconds to wait suggested by `Retry-After` or `X-RateLimit-Reset`.
fn rate_limit_hint(headers: &HeaderMap) -> Option<u64> {
    if let Some(retry_after) = header_str(headers, "Retry-After").and_then(|v| v.trim().parse().ok()) {
        return Some(retry_after);
    }

    header_str(headers, "X-RateLimit-Reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|reset| u64::try_from(reset - Utc::now().timestamp()).unwrap_or(0))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `rel="next"` target of the response's `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<Url> {
    header_str(headers, "Link")
        .and_then(parse_link_header)
        .and_then(|next| Url::parse(&next).ok())
}

/// Extract the `rel="next"` URL from an RFC 5988 `Link` header value.
pub fn parse_link_header(link_header: &str) -> Option<String> {
    for link in link_header.split(',') {
        let mut parts = link.split(';');
        let url_part = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });

        if is_next
            && let Some(start) = url_part.find('<')
            && let Some(end) = url_part.find('>')
            && start < end
        {
            return Some(url_part[start + 1..end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitProviderOverride;

    fn policy(base: f64, max: f64, jitter: f64) -> RetryPolicy {
        RetryPolicy {
            base_seconds: base,
            max_seconds: max,
            jitter_factor: jitter,
            max_retries: 3,
        }
    }

    #[test]
    fn link_header_next() {
        let header = "<https://api.github.com/repos/o/r/pulls?page=2>; rel=\"next\", \
                      <https://api.github.com/repos/o/r/pulls?page=5>; rel=\"last\"";
        assert_eq!(
            parse_link_header(header).as_deref(),
            Some("https://api.github.com/repos/o/r/pulls?page=2")
        );
    }

    #[test]
    fn link_header_without_next() {
        let header = "<https://api.github.com/repos/o/r/pulls?page=1>; rel=\"prev\"";
        assert_eq!(parse_link_header(header), None);
        assert_eq!(parse_link_header(""), None);
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = policy(5.0, 60.0, 0.0);
        assert_eq!(policy.backoff(0, None), Duration::from_secs(5));
        assert_eq!(policy.backoff(1, None), Duration::from_secs(10));
        assert_eq!(policy.backoff(2, None), Duration::from_secs(20));
        assert_eq!(policy.backoff(10, None), Duration::from_secs(60));
    }

    #[test]
    fn backoff_honors_server_hint_within_cap() {
        let policy = policy(1.0, 120.0, 0.0);
        assert_eq!(policy.backoff(0, Some(30)), Duration::from_secs(30));
        assert_eq!(policy.backoff(0, Some(3600)), Duration::from_secs(120));
    }

    #[test]
    fn backoff_jitter_stays_in_range() {
        let policy = policy(10.0, 900.0, 0.5);
        for _ in 0..50 {
            let delay = policy.backoff(0, None).as_secs_f64();
            assert!((10.0..15.0).contains(&delay), "delay {delay}");
        }
    }

    #[test]
    fn zero_base_without_jitter_does_not_panic() {
        let policy = policy(0.0, 0.0, 0.3);
        assert_eq!(policy.backoff(2, None), Duration::ZERO);
    }

    #[test]
    fn provider_overrides_apply() {
        let mut config = RateLimitPolicyConfig::default();
        config.provider_overrides.insert(
            "github".to_string(),
            RateLimitProviderOverride {
                base_seconds: Some(2),
                max_seconds: None,
                jitter_factor: Some(0.0),
                max_retries: Some(1),
            },
        );

        let github = RetryPolicy::for_provider(&config, "github");
        assert_eq!(github.base_seconds, 2.0);
        assert_eq!(github.max_seconds, config.max_seconds as f64);
        assert_eq!(github.max_retries, 1);

        let gitlab = RetryPolicy::for_provider(&config, "gitlab");
        assert_eq!(gitlab.base_seconds, config.base_seconds as f64);
    }

    #[test]
    fn forbidden_is_rate_limited_only_when_quota_exhausted() {
        let mut headers = HeaderMap::new();
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &headers));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &headers));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()));
    }

    #[test]
    fn retry_after_header_wins_over_reset() {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from_static("42"));
        headers.insert("X-RateLimit-Reset", HeaderValue::from_static("1"));
        assert_eq!(rate_limit_hint(&headers), Some(42));
    }

    #[test]
    fn url_joins_base_path() {
        let client = ApiClient::new(
            reqwest::Client::new(),
            "github",
            "https://ghe.example.com/api/v3/",
            AuthScheme::Bearer("t".to_string()),
            policy(0.0, 0.0, 0.0),
        )
        .unwrap();

        let url = client.url("/repos/o/r/pulls", &[("state", "all")]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/o/r/pulls?state=all"
        );
    }

    #[test]
    fn auth_debug_is_redacted() {
        let rendered = format!("{:?}", AuthScheme::Bearer("secret".to_string()));
        assert!(!rendered.contains("secret"));
    }
}
