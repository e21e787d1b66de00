//! Block-explorer profiles per network.
//!
//! Each profile knows the Etherscan-compatible API base and the public web
//! base used for `address/<addr>#code` links.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerProfile {
    /// Network name as used by the verification toolchain (`--network`).
    pub network: &'static str,
    pub api_url: &'static str,
    pub web_url: &'static str,
}

/// Built-in profiles.
pub const PROFILES: &[ExplorerProfile] = &[
    ExplorerProfile {
        network: "bsc",
        api_url: "https://api.bscscan.com/api",
        web_url: "https://bscscan.com",
    },
    ExplorerProfile {
        network: "bscTestnet",
        api_url: "https://api-testnet.bscscan.com/api",
        web_url: "https://testnet.bscscan.com",
    },
    ExplorerProfile {
        network: "sepolia",
        api_url: "https://api-sepolia.etherscan.io/api",
        web_url: "https://sepolia.etherscan.io",
    },
    ExplorerProfile {
        network: "mainnet",
        api_url: "https://api.etherscan.io/api",
        web_url: "https://etherscan.io",
    },
];

/// Look a profile up by network name (case-insensitive).
pub fn profile(network: &str) -> Option<&'static ExplorerProfile> {
    PROFILES
        .iter()
        .find(|p| p.network.eq_ignore_ascii_case(network))
}

/// Public source page for an address: `<web>/address/<addr>#code`.
pub fn address_url(web_url: &str, address: &str) -> String {
    format!("{}/address/{}#code", web_url.trim_end_matches('/'), address)
}
