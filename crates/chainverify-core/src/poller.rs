//! Client-side verification watcher.
//!
//! Triggers a verification once, then polls the status endpoint on a fixed
//! interval until the proxy is verified or the time budget runs out. The
//! backend is a trait so the loop can be driven without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::record::{VerificationRecord, VerificationRequest, VerificationStatus, VerifyOutcome};

/// Failure talking to the verification backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend answered 410: verification is switched off.
    #[error("verification is disabled on the backend")]
    Disabled,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// The two verification endpoints, seen from a client.
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    async fn trigger(&self, request: &VerificationRequest) -> Result<VerifyOutcome, BackendError>;
    async fn status(&self, proxy_address: &str) -> Result<VerificationRecord, BackendError>;
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_duration: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStrategy {
    /// Trigger, then poll until verified.
    Verify,
    /// Report success without asking anyone. For factory-deployed proxies
    /// whose implementation is known to be published already.
    AssumeVerified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Verified {
        status: VerificationStatus,
        explorer: Option<String>,
    },
    AssumedVerified,
    Disabled,
    Failed {
        status: VerificationStatus,
        error: Option<String>,
    },
    PollingTimeout {
        last_status: Option<VerificationStatus>,
    },
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "verified",
            Self::AssumedVerified => "assumed_verified",
            Self::Disabled => "disabled",
            Self::Failed { .. } => "failed",
            Self::PollingTimeout { .. } => "polling_timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Verified { .. } | Self::AssumedVerified)
    }
}

pub struct Poller {
    backend: Arc<dyn VerificationBackend>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(backend: Arc<dyn VerificationBackend>, config: PollerConfig) -> Self {
        Self { backend, config }
    }

    pub async fn run(&self, strategy: PollStrategy, request: &VerificationRequest) -> PollOutcome {
        let proxy = match request.proxy_address.as_deref() {
            Some(p) if !p.trim().is_empty() => p.trim().to_string(),
            _ => {
                return PollOutcome::Failed {
                    status: VerificationStatus::Failed,
                    error: Some("proxyAddress required".into()),
                }
            }
        };

        if strategy == PollStrategy::AssumeVerified {
            tracing::info!(address = %proxy, "assuming verified, no check performed");
            return PollOutcome::AssumedVerified;
        }

        let deadline = Instant::now() + self.config.max_duration;
        let mut last_status = None;

        match self.backend.trigger(request).await {
            Ok(outcome) => {
                tracing::info!(address = %proxy, status = %outcome.status, "verification triggered");
                if let Some(done) = terminal(outcome.status, outcome.explorer, outcome.error) {
                    return done;
                }
                last_status = Some(outcome.status);
            }
            Err(BackendError::Disabled) => return PollOutcome::Disabled,
            Err(e) => tracing::warn!(address = %proxy, error = %e, "trigger failed, polling anyway"),
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(address = %proxy, ?last_status, "gave up waiting for verification");
                return PollOutcome::PollingTimeout { last_status };
            }
            tokio::time::sleep(self.config.interval.min(remaining)).await;

            match self.backend.status(&proxy).await {
                Ok(record) => {
                    tracing::debug!(address = %proxy, status = %record.status, source = ?record.source, "polled");
                    if let Some(done) = terminal(record.status, record.explorer, record.error) {
                        return done;
                    }
                    last_status = Some(record.status);
                }
                Err(BackendError::Disabled) => return PollOutcome::Disabled,
                Err(e) => tracing::warn!(address = %proxy, error = %e, "status poll failed"),
            }
        }
    }
}

/// Verified ends the watch; so does a missing API key, which no amount of
/// polling fixes. Everything else keeps polling.
fn terminal(
    status: VerificationStatus,
    explorer: Option<String>,
    error: Option<String>,
) -> Option<PollOutcome> {
    if status.is_verified() {
        return Some(PollOutcome::Verified { status, explorer });
    }
    if status == VerificationStatus::ApiKeyMissing {
        return Some(PollOutcome::Failed { status, error });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StatusSource;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PROXY: &str = "0x1111111111111111111111111111111111111111";

    /// Scripted backend: replies are popped in order, the last one repeats.
    struct Scripted {
        trigger: Result<VerifyOutcome, BackendError>,
        statuses: Mutex<VecDeque<Result<VerificationStatus, BackendError>>>,
        trigger_calls: AtomicUsize,
        status_calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            trigger: Result<VerifyOutcome, BackendError>,
            statuses: Vec<Result<VerificationStatus, BackendError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                trigger,
                statuses: Mutex::new(statuses.into()),
                trigger_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VerificationBackend for Scripted {
        async fn trigger(&self, _: &VerificationRequest) -> Result<VerifyOutcome, BackendError> {
            self.trigger_calls.fetch_add(1, Ordering::SeqCst);
            self.trigger.clone()
        }

        async fn status(&self, proxy: &str) -> Result<VerificationRecord, BackendError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let mut q = self.statuses.lock().unwrap();
            let next = if q.len() > 1 { q.pop_front().unwrap() } else { q.front().cloned().unwrap() };
            next.map(|s| VerificationRecord::new(proxy, s, StatusSource::Api))
        }
    }

    fn outcome(status: VerificationStatus) -> VerifyOutcome {
        VerifyOutcome {
            code: Some(if status.is_failure() { 1 } else { 0 }),
            status,
            explorer: None,
            output: String::new(),
            implementation: None,
            error: None,
        }
    }

    fn fast() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(5),
            max_duration: Duration::from_millis(200),
        }
    }

    fn request() -> VerificationRequest {
        VerificationRequest {
            proxy_address: Some(PROXY.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn verified_on_trigger_skips_polling() {
        let backend = Scripted::new(Ok(outcome(VerificationStatus::AlreadyVerified)), vec![Ok(VerificationStatus::Unknown)]);
        let out = Poller::new(backend.clone(), fast()).run(PollStrategy::Verify, &request()).await;
        assert_eq!(out.label(), "verified");
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn polls_until_verified() {
        let backend = Scripted::new(
            Ok(outcome(VerificationStatus::Failed)),
            vec![
                Ok(VerificationStatus::NotVerified),
                Err(BackendError::Transport("connection reset".into())),
                Ok(VerificationStatus::RateLimited),
                Ok(VerificationStatus::Ok),
            ],
        );
        let out = Poller::new(backend.clone(), fast()).run(PollStrategy::Verify, &request()).await;
        assert_eq!(out, PollOutcome::Verified { status: VerificationStatus::Ok, explorer: None });
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn api_key_missing_stops_immediately() {
        let backend = Scripted::new(Ok(outcome(VerificationStatus::ApiKeyMissing)), vec![Ok(VerificationStatus::Ok)]);
        let out = Poller::new(backend.clone(), fast()).run(PollStrategy::Verify, &request()).await;
        assert_eq!(out.label(), "failed");
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_backend_is_not_retried() {
        let backend = Scripted::new(Err(BackendError::Disabled), vec![Ok(VerificationStatus::Ok)]);
        let out = Poller::new(backend.clone(), fast()).run(PollStrategy::Verify, &request()).await;
        assert_eq!(out, PollOutcome::Disabled);
        assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trigger_error_is_tolerated() {
        let backend = Scripted::new(
            Err(BackendError::Http { status: 502, body: "bad gateway".into() }),
            vec![Ok(VerificationStatus::AlreadyVerified)],
        );
        let out = Poller::new(backend, fast()).run(PollStrategy::Verify, &request()).await;
        assert!(out.is_success());
    }

    #[tokio::test]
    async fn gives_up_after_max_duration() {
        let backend = Scripted::new(Ok(outcome(VerificationStatus::Failed)), vec![Ok(VerificationStatus::NotVerified)]);
        let cfg = PollerConfig {
            interval: Duration::from_millis(10),
            max_duration: Duration::from_millis(50),
        };
        let started = std::time::Instant::now();
        let out = Poller::new(backend.clone(), cfg).run(PollStrategy::Verify, &request()).await;
        assert_eq!(
            out,
            PollOutcome::PollingTimeout { last_status: Some(VerificationStatus::NotVerified) }
        );
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(backend.status_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn assume_verified_makes_no_calls() {
        let backend = Scripted::new(Err(BackendError::Disabled), vec![Err(BackendError::Disabled)]);
        let out = Poller::new(backend.clone(), fast()).run(PollStrategy::AssumeVerified, &request()).await;
        assert_eq!(out.label(), "assumed_verified");
        assert!(out.is_success());
        assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_proxy_fails_fast() {
        let backend = Scripted::new(Ok(outcome(VerificationStatus::Ok)), vec![Ok(VerificationStatus::Ok)]);
        let out = Poller::new(backend.clone(), fast())
            .run(PollStrategy::Verify, &VerificationRequest::default())
            .await;
        assert_eq!(out.label(), "failed");
        assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let v = serde_json::to_value(PollOutcome::PollingTimeout { last_status: None }).unwrap();
        assert_eq!(v["outcome"], "polling_timeout");
    }
}
