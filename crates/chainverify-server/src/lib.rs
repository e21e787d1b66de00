//! chainverify-server: HTTP facade over the verification service.
//!
//! Wiring lives in [`build_state`]; the binary only loads config, installs
//! tracing and serves [`routes::router`].

pub mod artifacts;
pub mod config;
pub mod invoker;
pub mod routes;
pub mod service;
pub mod telemetry;

use std::sync::Arc;

use chainverify_core::cache::VerificationCache;
use chainverify_core::error::TransportError;
use chainverify_core::slot::{ImplementationResolver, SlotReader};
use chainverify_http::{ExplorerClient, ExplorerConfig, HttpRpcClient};

use crate::config::ServerConfig;
use crate::invoker::CommandRunner;
use crate::routes::AppState;
use crate::service::VerificationService;

pub use config::ConfigError;
pub use routes::{router, ApiError};

/// Build the shared state from configuration.
pub fn build_state(config: &ServerConfig) -> Result<AppState, TransportError> {
    let explorer = ExplorerClient::new(ExplorerConfig::new(
        config.explorer.api_url.clone(),
        config.explorer.web_url.clone(),
        config.explorer.api_key.clone(),
    ))?;

    let resolver = match &config.rpc_url {
        Some(url) => {
            let transport = Arc::new(HttpRpcClient::default_for(url.clone())?);
            Some(Arc::new(SlotReader::new(transport)) as Arc<dyn ImplementationResolver>)
        }
        None => None,
    };

    let service = VerificationService::new(
        Arc::new(VerificationCache::new(config.cache_ttl)),
        Arc::new(explorer),
        resolver,
        Arc::new(CommandRunner::new(config.verifier.clone())),
        config.default_network.clone(),
    );

    Ok(AppState {
        service: Arc::new(service),
        verify_enabled: config.verify_enabled,
        deployed_addresses_path: config.deployed_addresses_path.clone(),
        artifacts_dir: config.artifacts_dir.clone(),
        rpc_url: config.rpc_url.clone(),
    })
}
