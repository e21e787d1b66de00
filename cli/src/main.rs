//! ChainVerify CLI: inspect proxies and drive explorer verification.
//!
//! # Commands
//! ```
//! chainverify slot     --rpc <url> --proxy <addr>
//! chainverify status   --proxy <addr> [--network bsc] [--api-key <key>] [--rpc <url>]
//! chainverify verify   --backend <url> --proxy <addr> [--args '["Name", 18]'] [--watch]
//! chainverify watch    --backend <url> --proxy <addr> [--args '[..]'] [--network <n>] [--assume-verified]
//! chainverify classify [--file <path>] --exit-code <n>
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use chainverify_core::classify::classify_output;
use chainverify_core::explorer::ExplorerStatus;
use chainverify_core::poller::{PollStrategy, Poller, PollerConfig};
use chainverify_core::record::VerificationRequest;
use chainverify_core::slot::{derive_implementation, ImplementationResolver, SlotReader};
use chainverify_http::{BackendClient, ExplorerClient, ExplorerConfig, HttpRpcClient};

mod cmd_watch;

#[derive(Parser)]
#[command(
    name = "chainverify",
    about = "Explorer verification for EIP-1967 proxies (ChainVerify CLI)",
    long_about = "
ChainVerify CLI: read a proxy's implementation slot, check whether its source
is published on an Etherscan-compatible explorer, and trigger / watch
verification through a running chainverify-server.

ENVIRONMENT VARIABLES:
  RPC_URL              JSON-RPC endpoint (slot, status)
  EXPLORER_API_KEY     Explorer API key (status); page heuristics without it
  CHAINVERIFY_BACKEND  Base URL of chainverify-server (verify, watch)
",
    version
)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the EIP-1967 implementation slot of a proxy
    Slot {
        #[arg(long, env = "RPC_URL")]
        rpc: String,
        #[arg(long)]
        proxy: String,
        /// Print the raw 32-byte slot word as well
        #[arg(long)]
        raw: bool,
    },

    /// Ask the explorer whether a proxy's source is published
    Status {
        #[arg(long)]
        proxy: String,
        /// Explorer profile: bsc, bscTestnet, sepolia, mainnet
        #[arg(long, default_value = "bsc")]
        network: String,
        #[arg(long, env = "EXPLORER_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Resolve the implementation first and ask the explorer about it
        #[arg(long, env = "RPC_URL")]
        rpc: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Trigger verification on the backend
    Verify {
        #[command(flatten)]
        target: Target,
        /// Constructor arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,
        /// Network name passed to the verifier
        #[arg(long)]
        network: Option<String>,
        /// Keep polling the status endpoint until verified
        #[arg(long)]
        watch: bool,
        #[command(flatten)]
        polling: Polling,
    },

    /// Trigger once, then poll until verified or the time budget is spent
    Watch {
        #[command(flatten)]
        target: Target,
        /// Constructor arguments for the trigger, as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,
        /// Network name passed to the verifier
        #[arg(long)]
        network: Option<String>,
        /// Report success without contacting the backend
        #[arg(long)]
        assume_verified: bool,
        #[command(flatten)]
        polling: Polling,
    },

    /// Classify verifier output read from a file or stdin
    Classify {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Verifier exit code; omit when it was killed by a signal
        #[arg(long, allow_hyphen_values = true)]
        exit_code: Option<i32>,
    },
}

#[derive(Args)]
struct Target {
    #[arg(long, env = "CHAINVERIFY_BACKEND", default_value = "http://localhost:3000")]
    backend: String,
    #[arg(long)]
    proxy: String,
}

#[derive(Args)]
struct Polling {
    /// Seconds between status polls
    #[arg(long, default_value_t = 15)]
    interval: u64,
    /// Give up after this many seconds
    #[arg(long, default_value_t = 600)]
    max_wait: u64,
}

impl Polling {
    fn config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.interval.max(1)),
            max_duration: Duration::from_secs(self.max_wait),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter("chainverify_core=debug,chainverify_http=debug")
            .init();
    }

    let result = match cli.command {
        Commands::Slot { rpc, proxy, raw } => cmd_slot(&rpc, &proxy, raw).await,
        Commands::Status { proxy, network, api_key, rpc, json } => {
            cmd_status(&proxy, &network, api_key, rpc.as_deref(), json).await
        }
        Commands::Verify { target, args, network, watch, polling } => {
            cmd_watch::verify(&target.backend, &target.proxy, &args, network, watch, polling.config()).await
        }
        Commands::Watch { target, args, network, assume_verified, polling } => {
            let strategy = if assume_verified {
                PollStrategy::AssumeVerified
            } else {
                PollStrategy::Verify
            };
            cmd_watch::watch(&target.backend, &target.proxy, &args, network, strategy, polling.config())
                .await
        }
        Commands::Classify { file, exit_code } => cmd_classify(file, exit_code),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn cmd_slot(rpc: &str, proxy: &str, raw: bool) -> Result<()> {
    let reader = SlotReader::new(Arc::new(HttpRpcClient::default_for(rpc)?));
    let word = reader.read_slot(proxy).await?;
    let implementation = derive_implementation(&word)?;
    if raw {
        println!("slot:           {word}");
    }
    println!("implementation: {implementation}");
    Ok(())
}

async fn cmd_status(
    proxy: &str,
    network: &str,
    api_key: Option<String>,
    rpc: Option<&str>,
    json: bool,
) -> Result<()> {
    let address = chainverify_core::normalize_address(proxy)?;
    let profile = chainverify_core::network::profile(network)
        .ok_or_else(|| anyhow!("unknown network '{network}'"))?;
    let implementation = match rpc {
        Some(url) => {
            let reader = SlotReader::new(Arc::new(HttpRpcClient::default_for(url)?));
            Some(reader.resolve(&address).await?)
        }
        None => None,
    };
    let explorer = ExplorerClient::new(ExplorerConfig::from_profile(profile, api_key))?;
    let record = explorer.fetch_status(&address, implementation.as_deref()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }
    println!("address:  {}", record.address);
    println!("status:   {}", record.status);
    println!("source:   {:?}", record.source);
    if let Some(implementation) = &record.implementation {
        println!("impl:     {implementation}");
    }
    if let Some(url) = &record.explorer {
        println!("explorer: {url}");
    }
    if let Some(note) = &record.note {
        println!("note:     {note}");
    }
    if let Some(err) = &record.error {
        println!("error:    {err}");
    }
    if record.status.is_failure() {
        bail!("explorer lookup failed");
    }
    Ok(())
}

fn cmd_classify(file: Option<PathBuf>, exit_code: Option<i32>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let c = classify_output(&text, exit_code);
    println!("{}", serde_json::to_string_pretty(&json!({"status": c.status, "explorer": c.explorer}))?);
    Ok(())
}

/// Parse `--args` as a JSON array.
fn parse_constructor_args(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).context("--args must be JSON")? {
        Value::Array(items) => Ok(items),
        other => bail!("--args must be a JSON array, got {other}"),
    }
}

fn request(proxy: &str, constructor_args: Vec<Value>, network: Option<String>) -> VerificationRequest {
    VerificationRequest {
        proxy_address: Some(proxy.to_string()),
        constructor_args,
        network,
    }
}

fn backend(url: &str) -> Result<Arc<BackendClient>> {
    // The trigger call blocks for a whole verifier run.
    Ok(Arc::new(BackendClient::new(url, Duration::from_secs(180))?))
}

fn poller(url: &str, config: PollerConfig) -> Result<Poller> {
    Ok(Poller::new(backend(url)?, config))
}
