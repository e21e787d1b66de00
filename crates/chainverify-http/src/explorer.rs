//! Etherscan-compatible explorer client.
//!
//! With an API key it asks `getsourcecode`; without one it fetches the
//! public address page and pattern-matches it. Either way at most one
//! outbound request is made per lookup and every failure comes back as a
//! record, never an `Err`.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use chainverify_core::error::TransportError;
use chainverify_core::explorer::{classify_api_body, classify_html_page, ExplorerStatus};
use chainverify_core::network::{address_url, ExplorerProfile};
use chainverify_core::policy::{RateLimiter, RateLimiterConfig};
use chainverify_core::record::{StatusSource, VerificationRecord, VerificationStatus};

#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// API endpoint, e.g. `https://api.bscscan.com/api`.
    pub api_url: String,
    /// Public site, e.g. `https://bscscan.com`.
    pub web_url: String,
    /// `None` switches to the HTML page heuristic.
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub rate_limiter: RateLimiterConfig,
}

impl ExplorerConfig {
    pub fn new(api_url: impl Into<String>, web_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_url: api_url.into(),
            web_url: web_url.into(),
            api_key,
            request_timeout: Duration::from_secs(15),
            rate_limiter: RateLimiterConfig::explorer_free_tier(),
        }
    }

    pub fn from_profile(profile: &ExplorerProfile, api_key: Option<String>) -> Self {
        Self::new(profile.api_url, profile.web_url, api_key)
    }
}

pub struct ExplorerClient {
    http: reqwest::Client,
    config: ExplorerConfig,
    limiter: RateLimiter,
}

impl ExplorerClient {
    pub fn new(config: ExplorerConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        let limiter = RateLimiter::new(config.rate_limiter.clone());
        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Public `#code` page for `address`.
    pub fn explorer_url(&self, address: &str) -> String {
        address_url(&self.config.web_url, address)
    }

    fn mode(&self) -> StatusSource {
        if self.has_api_key() {
            StatusSource::Api
        } else {
            StatusSource::HtmlHeuristic
        }
    }

    async fn fetch_api(
        &self,
        address: &str,
        target: &str,
        api_key: &str,
        explorer: &str,
    ) -> VerificationRecord {
        let resp = self
            .http
            .get(&self.config.api_url)
            .query(&[
                ("module", "contract"),
                ("action", "getsourcecode"),
                ("address", target),
                ("apikey", api_key),
            ])
            .send()
            .await;
        let resp = match resp {
            Ok(r) => r,
            Err(e) => return transport_failure(address, StatusSource::Api, explorer, e),
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return transport_failure(address, StatusSource::Api, explorer, e),
        };
        if !status.is_success() {
            return VerificationRecord::new(address, VerificationStatus::Failed, StatusSource::Api)
                .with_explorer(explorer)
                .with_error(format!("explorer API returned HTTP {}", status.as_u16()))
                .with_raw(body);
        }
        classify_api_body(address, &body, explorer)
    }

    async fn fetch_page(&self, address: &str, target: &str, explorer: &str) -> VerificationRecord {
        let page = format!("{}/address/{}", self.config.web_url.trim_end_matches('/'), target);
        let resp = match self.http.get(&page).send().await {
            Ok(r) => r,
            Err(e) => return transport_failure(address, StatusSource::HtmlHeuristic, explorer, e),
        };
        let status = resp.status();
        if !status.is_success() {
            return VerificationRecord::new(
                address,
                VerificationStatus::Failed,
                StatusSource::HtmlHeuristic,
            )
            .with_explorer(explorer)
            .with_error(format!("explorer page returned HTTP {}", status.as_u16()));
        }
        match resp.text().await {
            Ok(html) => classify_html_page(address, &html, explorer),
            Err(e) => transport_failure(address, StatusSource::HtmlHeuristic, explorer, e),
        }
    }
}

#[async_trait]
impl ExplorerStatus for ExplorerClient {
    async fn fetch_status(
        &self,
        proxy_address: &str,
        implementation: Option<&str>,
    ) -> VerificationRecord {
        let explorer = self.explorer_url(proxy_address);
        let target = implementation.unwrap_or(proxy_address);

        if !self.limiter.try_acquire() {
            let wait = self.limiter.wait_time();
            tracing::debug!(address = %proxy_address, wait_ms = wait.as_millis() as u64, "explorer budget exhausted");
            return VerificationRecord::new(proxy_address, VerificationStatus::RateLimited, self.mode())
                .with_explorer(explorer)
                .with_error(format!(
                    "explorer call budget exhausted; retry in {}ms",
                    wait.as_millis()
                ));
        }

        let started = Instant::now();
        let mut record = match self.config.api_key.as_deref() {
            Some(key) => self.fetch_api(proxy_address, target, key, &explorer).await,
            None => self.fetch_page(proxy_address, target, &explorer).await,
        };
        if let Some(implementation) = implementation {
            record.implementation = Some(implementation.to_string());
        }
        tracing::debug!(
            address = %proxy_address,
            queried = %target,
            status = %record.status,
            source = ?record.source,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "explorer lookup"
        );
        record
    }
}

fn transport_failure(
    address: &str,
    source: StatusSource,
    explorer: &str,
    e: reqwest::Error,
) -> VerificationRecord {
    tracing::warn!(address = %address, error = %e, "explorer request failed");
    VerificationRecord::new(address, VerificationStatus::Failed, source)
        .with_explorer(explorer)
        .with_error(e.to_string())
}
