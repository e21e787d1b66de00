use anyhow::Context;
use tokio::net::TcpListener;

use chainverify_server::config::ServerConfig;
use chainverify_server::telemetry::init_tracing;
use chainverify_server::{build_state, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    init_tracing(&config.log).context("failed to install tracing subscriber")?;

    if config.rpc_url.is_none() {
        tracing::warn!("RPC_URL not set; verify requests will fail until it is configured");
    }
    if config.explorer.api_key.is_none() {
        tracing::warn!(
            explorer = %config.explorer.web_url,
            "no explorer API key; status lookups fall back to page heuristics"
        );
    }

    let state = build_state(&config).context("failed to build clients")?;
    let app = router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        addr = %config.bind,
        verify_enabled = config.verify_enabled,
        explorer_network = %config.explorer.network,
        default_network = %config.default_network,
        "chainverify-server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
