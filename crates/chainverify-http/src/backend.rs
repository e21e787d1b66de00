//! Client for a running `chainverify-server`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use chainverify_core::error::TransportError;
use chainverify_core::poller::{BackendError, VerificationBackend};
use chainverify_core::record::{VerificationRecord, VerificationRequest, VerifyOutcome};

pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    /// `request_timeout` must cover a full verifier run on the trigger call.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// 410 is "disabled"; any other status is accepted as long as the body
/// parses, since failed verifications come back as 500 with a full payload.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BackendError> {
    let status = resp.status();
    if status == StatusCode::GONE {
        return Err(BackendError::Disabled);
    }
    let body = resp
        .text()
        .await
        .map_err(|e| BackendError::Transport(e.to_string()))?;
    serde_json::from_str::<T>(&body).map_err(|_| BackendError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl VerificationBackend for BackendClient {
    async fn trigger(&self, request: &VerificationRequest) -> Result<VerifyOutcome, BackendError> {
        let resp = self
            .http
            .post(format!("{}/api/verify-proxy", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        decode(resp).await
    }

    async fn status(&self, proxy_address: &str) -> Result<VerificationRecord, BackendError> {
        let resp = self
            .http
            .get(format!("{}/api/verify-proxy/status", self.base_url))
            .query(&[("proxyAddress", proxy_address)])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        decode(resp).await
    }
}
