use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, DNT, HeaderMap, HeaderValue, REFERER, UPGRADE_INSECURE_REQUESTS,
    USER_AGENT,
};
use scholarsnap_core::config::{FetchConfig, secs};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

/// Phrases of known challenge pages, matched case-insensitively.
/// The site changes these over time; extend via `fetch.block_phrases`.
pub const BLOCK_PHRASES: &[&str] = &[
    "please show you're not a robot",
    "our systems have detected unusual traffic",
    "unusual traffic from your computer network",
    "detected unusual traffic",
    "enable javascript",
    "sorry, we can't verify that you're not a robot",
];

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const API_ACCEPT: &str = "application/json";
const REFERER_URL: &str = "https://www.google.com/";

/// How a request presents itself and how its response is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Browser-like page request; soft blocks are detected in the body.
    Page,
    /// Structured API request; only the status code is judged.
    Api,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            jitter,
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// `base_delay * 2^(attempt-1)` plus `jitter * jitter_fraction`.
    pub fn delay_for(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        backoff + self.jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.delay_for(attempt, rand::rng().random::<f64>())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5), Duration::from_millis(700))
    }
}

// ─── BrowserClient ───────────────────────────────────────────────────────────

/// Sequential HTTP client that looks like a browser, retries with exponential
/// backoff, and treats challenge pages as failures.
///
/// One instance is one session: cookies and keep-alive connections are reused
/// across requests of a run.
pub struct BrowserClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    user_agents: Vec<String>,
    block_phrases: Vec<String>,
    accept_language: String,
}

impl BrowserClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            retry,
            user_agents: USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
            block_phrases: BLOCK_PHRASES.iter().map(|s| (*s).to_string()).collect(),
            accept_language: "en-US,en;q=0.9".to_string(),
        })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let retry = RetryPolicy::new(
            config.max_retries,
            secs(config.backoff_secs),
            secs(config.jitter_secs),
        );
        Ok(Self::new(config.timeout(), retry)?
            .with_user_agents(config.user_agents.clone())
            .with_block_phrases(config.block_phrases.iter().cloned()))
    }

    /// Replaces the identity pool; an empty list keeps the built-in one.
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        let user_agents: Vec<String> = user_agents
            .into_iter()
            .filter(|ua| HeaderValue::from_str(ua).is_ok())
            .collect();
        if !user_agents.is_empty() {
            self.user_agents = user_agents;
        }
        self
    }

    pub fn with_block_phrases<I: IntoIterator<Item = String>>(mut self, phrases: I) -> Self {
        for phrase in phrases {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !self.block_phrases.contains(&phrase) {
                self.block_phrases.push(phrase);
            }
        }
        self
    }

    pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.accept_language = accept_language.into();
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Headers built fresh for every attempt, with a random identity.
    pub fn request_headers(&self, kind: RequestKind) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agents
            .choose(&mut rand::rng())
            .and_then(|ua| HeaderValue::from_str(ua).ok())
            .unwrap_or_else(|| HeaderValue::from_static(USER_AGENTS[0]));
        headers.insert(USER_AGENT, user_agent);

        match kind {
            RequestKind::Page => {
                headers.insert(ACCEPT, HeaderValue::from_static(PAGE_ACCEPT));
                if let Ok(lang) = HeaderValue::from_str(&self.accept_language) {
                    headers.insert(ACCEPT_LANGUAGE, lang);
                }
                headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
                headers.insert(DNT, HeaderValue::from_static("1"));
                headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
            }
            RequestKind::Api => {
                headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
            }
        }
        headers
    }

    /// The challenge phrase found in `body`, if any.
    pub fn block_phrase(&self, body: &str) -> Option<&str> {
        let body = body.to_lowercase();
        self.block_phrases
            .iter()
            .find(|phrase| body.contains(phrase.as_str()))
            .map(String::as_str)
    }

    /// Judges one response. A 403 and a 200 challenge page are both `Blocked`.
    pub fn classify(&self, url: &str, status: StatusCode, body: &str, kind: RequestKind) -> Result<()> {
        if status == StatusCode::FORBIDDEN && kind == RequestKind::Page {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
                reason: "HTTP 403".to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if kind == RequestKind::Page {
            if let Some(phrase) = self.block_phrase(body) {
                return Err(ScrapeError::Blocked {
                    url: url.to_string(),
                    reason: format!("challenge page (\"{phrase}\")"),
                });
            }
        }
        Ok(())
    }

    /// Fetches a page with the client's own retry policy.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        self.fetch_with(url, &self.retry, RequestKind::Page).await
    }

    /// Fetches `url`, retrying retryable failures up to `policy.max_attempts`.
    /// The attempt counter starts over for every call.
    pub async fn fetch_with(&self, url: &str, policy: &RetryPolicy, kind: RequestKind) -> Result<String> {
        let max = policy.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            info!("Fetching {url} (attempt {attempt}/{max})");
            let err = match self.attempt(url, kind).await {
                Ok(body) => {
                    info!("Fetched {url} ({} bytes)", body.len());
                    return Ok(body);
                }
                Err(err) => err,
            };

            if attempt >= max || !err.is_retryable() {
                warn!("Giving up on {url} after attempt {attempt}/{max}: {err}");
                return Err(ScrapeError::Fetch {
                    url: url.to_string(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let wait = policy.backoff(attempt);
            warn!(
                "Fetch failed (attempt {attempt}/{max}): {err}. Sleeping {:.1}s...",
                wait.as_secs_f64()
            );
            sleep(wait).await;
        }
    }

    async fn attempt(&self, url: &str, kind: RequestKind) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .headers(self.request_headers(kind))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        self.classify(url, status, &body, kind)?;
        Ok(body)
    }
}
