//! Verification service: cache-then-explorer status lookups and
//! single-flight verifier runs.
//!
//! The service owns the cache, keyed by proxy address. Status lookups ask the
//! explorer about the resolved implementation and write every outcome into
//! the cache; verifier runs write successful outcomes only.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use chainverify_core::address::normalize_address;
use chainverify_core::cache::VerificationCache;
use chainverify_core::classify::{classify_output, normalize_output};
use chainverify_core::error::VerifyError;
use chainverify_core::explorer::ExplorerStatus;
use chainverify_core::inflight::SingleFlight;
use chainverify_core::record::{StatusSource, VerificationRecord, VerificationStatus, VerifyOutcome};
use chainverify_core::slot::ImplementationResolver;

use crate::invoker::{serialize_constructor_args, VerificationRunner};

pub struct VerificationService {
    cache: Arc<VerificationCache>,
    explorer: Arc<dyn ExplorerStatus>,
    /// `None` when no RPC endpoint is configured.
    resolver: Option<Arc<dyn ImplementationResolver>>,
    runner: Arc<dyn VerificationRunner>,
    flights: SingleFlight<VerifyOutcome>,
    default_network: String,
}

impl VerificationService {
    pub fn new(
        cache: Arc<VerificationCache>,
        explorer: Arc<dyn ExplorerStatus>,
        resolver: Option<Arc<dyn ImplementationResolver>>,
        runner: Arc<dyn VerificationRunner>,
        default_network: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            explorer,
            resolver,
            runner,
            flights: SingleFlight::new(),
            default_network: default_network.into(),
        }
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    pub fn is_verifying(&self, proxy_address: &str) -> bool {
        self.flights.is_in_flight(proxy_address)
    }

    /// Verifier runs currently in progress.
    pub fn verifications_in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Current status of `proxy_address`.
    ///
    /// A running verification wins over the cache and is reported as
    /// `pending` without being stored.
    pub async fn status(&self, proxy_address: &str) -> Result<VerificationRecord, VerifyError> {
        let address = normalize_address(proxy_address)?;

        if self.is_verifying(&address) {
            return Ok(VerificationRecord::new(
                &address,
                VerificationStatus::Pending,
                StatusSource::InFlight,
            )
            .with_note("a verification for this address is running"));
        }

        if let Some(hit) = self.cache.get(&address) {
            tracing::debug!(address = %address, status = %hit.status, "status cache hit");
            return Ok(hit);
        }

        let implementation = self.implementation_of(&address).await;
        let record = self
            .explorer
            .fetch_status(&address, implementation.as_deref())
            .await;
        tracing::info!(address = %address, status = %record.status, source = ?record.source, "status refreshed");
        Ok(self.cache.put(&address, record))
    }

    /// Best-effort slot read for status lookups. Without an RPC endpoint, or
    /// when the read fails, the explorer is asked about the proxy itself.
    async fn implementation_of(&self, address: &str) -> Option<String> {
        let resolver = self.resolver.as_ref()?;
        match resolver.resolve(address).await {
            Ok(implementation) => Some(implementation),
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "implementation lookup failed; asking about the proxy");
                None
            }
        }
    }

    /// Verify the implementation behind `proxy_address`.
    ///
    /// Concurrent calls for the same address share one run, including its
    /// arguments; the run continues if every caller disconnects.
    pub async fn verify(
        &self,
        proxy_address: &str,
        constructor_args: &[Value],
        network: Option<&str>,
    ) -> Result<VerifyOutcome, VerifyError> {
        let address = normalize_address(proxy_address)?;
        let resolver = self
            .resolver
            .clone()
            .ok_or_else(|| VerifyError::Config("RPC_URL is not configured".into()))?;

        let network = network
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.default_network)
            .to_string();
        let job = VerificationJob {
            address: address.clone(),
            network,
            constructor_args: serialize_constructor_args(constructor_args),
            resolver,
            runner: Arc::clone(&self.runner),
            cache: Arc::clone(&self.cache),
        };

        let outcome = self
            .flights
            .run(&address, job.run())
            .await
            .unwrap_or_else(|aborted| VerifyOutcome::failed(aborted.to_string()));
        Ok(outcome)
    }
}

/// Everything one verifier run needs, owned so it can live on its own task.
struct VerificationJob {
    address: String,
    network: String,
    constructor_args: Vec<String>,
    resolver: Arc<dyn ImplementationResolver>,
    runner: Arc<dyn VerificationRunner>,
    cache: Arc<VerificationCache>,
}

impl VerificationJob {
    async fn run(self) -> VerifyOutcome {
        let started = Instant::now();

        let implementation = match self.resolver.resolve(&self.address).await {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(address = %self.address, error = %e, "implementation lookup failed");
                return VerifyOutcome::failed(e.to_string());
            }
        };

        let run = self
            .runner
            .run(&self.network, &implementation, &self.constructor_args)
            .await;
        let outcome = match run {
            Ok(out) => {
                let c = classify_output(&out.output, out.code);
                let error = match c.status {
                    VerificationStatus::ApiKeyMissing => Some(format!(
                        "explorer API key missing for network '{}'",
                        self.network
                    )),
                    VerificationStatus::Failed => Some("verifier failed; see output".to_string()),
                    _ => None,
                };
                VerifyOutcome {
                    code: out.code,
                    status: c.status,
                    explorer: c.explorer,
                    output: normalize_output(&out.output),
                    implementation: Some(implementation.clone()),
                    error,
                }
            }
            Err(e) => VerifyOutcome {
                implementation: Some(implementation.clone()),
                ..VerifyOutcome::failed(e.to_string())
            },
        };

        tracing::info!(
            address = %self.address,
            implementation = %implementation,
            network = %self.network,
            status = %outcome.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verification finished"
        );

        if outcome.status.is_verified() {
            let mut record =
                VerificationRecord::new(&self.address, outcome.status, StatusSource::Verifier)
                    .with_implementation(implementation)
                    .with_raw(outcome.output.clone());
            record.explorer = outcome.explorer.clone();
            self.cache.put(&self.address, record);
        }
        outcome
    }
}
