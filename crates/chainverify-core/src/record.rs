//! Verification status model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every state a proxy's verification can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unknown,
    NotVerified,
    Pending,
    AlreadyVerified,
    Ok,
    ApiKeyMissing,
    RateLimited,
    Failed,
}

impl VerificationStatus {
    /// `already_verified` and `ok` both mean the source is published.
    pub fn is_verified(self) -> bool {
        matches!(self, Self::AlreadyVerified | Self::Ok)
    }

    /// Statuses the HTTP facade reports as a server-side failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::ApiKeyMissing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotVerified => "not_verified",
            Self::Pending => "pending",
            Self::AlreadyVerified => "already_verified",
            Self::Ok => "ok",
            Self::ApiKeyMissing => "api_key_missing",
            Self::RateLimited => "rate_limited",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a status was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// Explorer JSON API.
    Api,
    /// Pattern match on the explorer's public HTML page; low confidence.
    HtmlHeuristic,
    /// Output of the verification toolchain.
    Verifier,
    /// A verification for this address is currently running.
    InFlight,
}

/// The verification state of one deployed proxy contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    /// Proxy address as supplied by the caller, lower-cased.
    pub address: String,
    pub status: VerificationStatus,
    pub source: StatusSource,
    /// Public source page on the explorer.
    pub explorer: Option<String>,
    /// Last API body or subprocess output, for operators only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Implementation address as reported by the explorer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn new(address: impl Into<String>, status: VerificationStatus, source: StatusSource) -> Self {
        Self {
            address: address.into(),
            status,
            source,
            explorer: None,
            raw: None,
            error: None,
            note: None,
            implementation: None,
            observed_at: Utc::now(),
        }
    }

    pub fn with_explorer(mut self, url: impl Into<String>) -> Self {
        self.explorer = Some(url.into());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }
}

/// Body of `POST /api/verify-proxy`.
///
/// All fields are optional on the wire so that a missing `proxyAddress` can be
/// answered with a 400 instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    #[serde(default)]
    pub proxy_address: Option<String>,
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    #[serde(default)]
    pub network: Option<String>,
}

/// Result of one verification run, as returned by `POST /api/verify-proxy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    /// Verifier exit code; `None` when the process never finished.
    pub code: Option<i32>,
    pub status: VerificationStatus,
    pub explorer: Option<String>,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyOutcome {
    /// An outcome for a run that failed before or around the subprocess.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            code: None,
            status: VerificationStatus::Failed,
            explorer: None,
            output: String::new(),
            implementation: None,
            error: Some(error.into()),
        }
    }
}
