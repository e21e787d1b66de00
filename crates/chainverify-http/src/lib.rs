//! chainverify-http: the network edge of ChainVerify.
//!
//! - [`HttpRpcClient`]: single-shot JSON-RPC over HTTP, used for the slot read
//! - [`ExplorerClient`]: Etherscan-compatible status lookups (API or page)
//! - [`BackendClient`]: talks to a running `chainverify-server`

pub mod backend;
pub mod client;
pub mod explorer;

pub use backend::BackendClient;
pub use client::{HttpClientConfig, HttpRpcClient};
pub use explorer::{ExplorerClient, ExplorerConfig};

/// `User-Agent` sent on every outbound request.
pub const USER_AGENT: &str = concat!("chainverify/", env!("CARGO_PKG_VERSION"));
