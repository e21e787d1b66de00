//! `verify` and `watch`: trigger through the backend and poll until done.

use anyhow::{bail, Result};
use chainverify_core::poller::{PollOutcome, PollStrategy, PollerConfig, VerificationBackend};

use crate::{backend, parse_constructor_args, poller, request};

pub async fn verify(
    backend_url: &str,
    proxy: &str,
    raw_args: &str,
    network: Option<String>,
    watch: bool,
    config: PollerConfig,
) -> Result<()> {
    let req = request(proxy, parse_constructor_args(raw_args)?, network);

    if watch {
        let outcome = poller(backend_url, config)?.run(PollStrategy::Verify, &req).await;
        return report(&outcome);
    }

    let outcome = backend(backend_url)?.trigger(&req).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if !outcome.status.is_verified() {
        bail!("verification ended with status {}", outcome.status);
    }
    Ok(())
}

pub async fn watch(
    backend_url: &str,
    proxy: &str,
    raw_args: &str,
    network: Option<String>,
    strategy: PollStrategy,
    config: PollerConfig,
) -> Result<()> {
    let req = request(proxy, parse_constructor_args(raw_args)?, network);
    let outcome = poller(backend_url, config)?.run(strategy, &req).await;
    report(&outcome)
}

fn report(outcome: &PollOutcome) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if !outcome.is_success() {
        bail!("watch ended: {}", outcome.label());
    }
    Ok(())
}
