//! Server configuration from environment variables.
//!
//! Everything goes through [`ServerConfig::from_lookup`] so tests can feed a
//! map instead of touching the process environment. Empty values count as
//! unset.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use chainverify_core::cache::DEFAULT_TTL;
use chainverify_core::network;

use crate::invoker::VerifierConfig;
use crate::telemetry::LogConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("unknown explorer network '{0}'; set EXPLORER_API_URL and EXPLORER_WEB_URL")]
    UnknownNetwork(String),
}

/// Where status lookups go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerSettings {
    pub network: String,
    pub api_url: String,
    pub web_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// JSON-RPC endpoint for the implementation-slot read.
    pub rpc_url: Option<String>,
    pub explorer: ExplorerSettings,
    /// Kill-switch for both verify endpoints.
    pub verify_enabled: bool,
    pub verifier: VerifierConfig,
    /// Network passed to the verifier when a request names none.
    pub default_network: String,
    pub cache_ttl: Duration,
    pub deployed_addresses_path: PathBuf,
    pub artifacts_dir: PathBuf,
    pub log: LogConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = match (get("BIND"), get("PORT")) {
            (Some(bind), _) => parse_addr("BIND", &bind)?,
            (None, Some(port)) => {
                let port: u16 = port.parse().map_err(|e| invalid("PORT", e))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let explorer_network = get("EXPLORER_NETWORK").unwrap_or_else(|| "bsc".into());
        let profile = network::profile(&explorer_network);
        let api_url = get("EXPLORER_API_URL").or_else(|| profile.map(|p| p.api_url.to_string()));
        let web_url = get("EXPLORER_WEB_URL").or_else(|| profile.map(|p| p.web_url.to_string()));
        let (Some(api_url), Some(web_url)) = (api_url, web_url) else {
            return Err(ConfigError::UnknownNetwork(explorer_network));
        };
        let api_key = get("EXPLORER_API_KEY")
            .or_else(|| get("BSCSCAN_API_KEY"))
            .or_else(|| get("ETHERSCAN_API_KEY"));

        let mut verifier = VerifierConfig::default();
        if let Some(program) = get("VERIFY_COMMAND") {
            verifier.program = program;
        }
        if let Some(args) = get("VERIFY_ARGS") {
            verifier.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(dir) = get("VERIFY_WORKDIR") {
            verifier.workdir = PathBuf::from(dir);
        }
        verifier.contract = get("VERIFY_CONTRACT");
        if let Some(secs) = get("VERIFY_TIMEOUT_SECS") {
            verifier.timeout = parse_secs("VERIFY_TIMEOUT_SECS", &secs)?;
        }

        let cache_ttl = match get("CACHE_TTL_SECS") {
            Some(secs) => parse_secs("CACHE_TTL_SECS", &secs)?,
            None => DEFAULT_TTL,
        };

        let verify_enabled = match get("VERIFY_PROXY_ENABLED") {
            Some(v) => parse_bool("VERIFY_PROXY_ENABLED", &v)?,
            None => false,
        };

        let log = LogConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            components: get("LOG_COMPONENTS")
                .map(|v| parse_components(&v))
                .transpose()?
                .unwrap_or_default(),
            json: match get("LOG_JSON") {
                Some(v) => parse_bool("LOG_JSON", &v)?,
                None => false,
            },
        };

        Ok(Self {
            bind,
            rpc_url: get("RPC_URL"),
            explorer: ExplorerSettings {
                network: explorer_network,
                api_url,
                web_url,
                api_key,
            },
            verify_enabled,
            verifier,
            default_network: get("DEFAULT_NETWORK").unwrap_or_else(|| "bsc".into()),
            cache_ttl,
            deployed_addresses_path: get("DEPLOYED_ADDRESSES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("deployed_addresses.json")),
            artifacts_dir: get("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("../smart-contract/artifacts/contracts")),
            log,
        })
    }
}

fn invalid(var: &'static str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: e.to_string(),
    }
}

fn parse_addr(var: &'static str, v: &str) -> Result<SocketAddr, ConfigError> {
    v.parse().map_err(|e| invalid(var, e))
}

fn parse_secs(var: &'static str, v: &str) -> Result<Duration, ConfigError> {
    match v.parse::<u64>() {
        Ok(0) => Err(invalid(var, "must be greater than zero")),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(invalid(var, e)),
    }
}

fn parse_bool(var: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
    }
}

/// `chainverify_http=debug,tower_http=info`
fn parse_components(v: &str) -> Result<HashMap<String, String>, ConfigError> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, level)) if !name.trim().is_empty() && !level.trim().is_empty() => {
                Ok((name.trim().to_string(), level.trim().to_string()))
            }
            _ => Err(invalid("LOG_COMPONENTS", format!("expected name=level, got '{pair}'"))),
        })
        .collect()
}
