//! Explorer "is the source published?" classification.
//!
//! Two inputs are understood:
//! - the Etherscan-compatible `module=contract&action=getsourcecode` JSON body
//! - the explorer's public address page (HTML), used when no API key is set
//!
//! The HTML path is a best-effort heuristic tied to third-party markup and is
//! labelled [`StatusSource::HtmlHeuristic`] so consumers can discount it.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::record::{StatusSource, VerificationRecord, VerificationStatus};

static RATE_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)rate\s*limit").expect("valid regex"));

static HTML_VERIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)source\s+code\s+verified").expect("valid regex"));

static HTML_NOT_VERIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)source\s+code\s+not\s+verified|verify\s+and\s+publish|are\s+you\s+the\s+contract\s+creator",
    )
    .expect("valid regex")
});

/// Keep stored HTML diagnostics small; pages run to hundreds of KB.
const HTML_RAW_LIMIT: usize = 2_048;

pub const HTML_NOTE: &str =
    "no explorer API key configured; status inferred from the public page markup (best effort)";

pub const PROXY_ONLY_NOTE: &str =
    "explorer lists this address as a proxy; its own source says nothing about the implementation";

/// Anything that can tell whether the source behind a proxy is published.
///
/// The explorer is asked about `implementation` when it is known and about
/// the proxy itself otherwise. The record is always keyed by the proxy.
/// Implementations never fail: transport problems come back as a
/// [`VerificationStatus::Failed`] record with the error attached.
#[async_trait]
pub trait ExplorerStatus: Send + Sync {
    async fn fetch_status(
        &self,
        proxy_address: &str,
        implementation: Option<&str>,
    ) -> VerificationRecord;
}

/// Classify a `getsourcecode` response body.
pub fn classify_api_body(address: &str, body: &str, explorer_url: &str) -> VerificationRecord {
    let base = |status| {
        VerificationRecord::new(address, status, StatusSource::Api)
            .with_explorer(explorer_url)
            .with_raw(body)
    };

    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return base(VerificationStatus::Failed)
                .with_error(format!("explorer returned invalid JSON: {e}"))
        }
    };

    if let Some(msg) = json.get("result").and_then(Value::as_str) {
        if RATE_LIMIT.is_match(msg) {
            return base(VerificationStatus::RateLimited).with_error(msg);
        }
        let ok_status = matches!(json.get("status").and_then(Value::as_str), Some("1"));
        if !ok_status {
            return base(VerificationStatus::Unknown).with_error(msg);
        }
    }

    let entry = match json.get("result") {
        Some(Value::Array(items)) => items.first(),
        Some(obj @ Value::Object(_)) => Some(obj),
        _ => None,
    };
    let Some(entry) = entry else {
        return base(VerificationStatus::Unknown);
    };
    let Some(source) = entry.get("SourceCode") else {
        return base(VerificationStatus::Unknown);
    };

    let implementation = entry
        .get("Implementation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let is_proxy = matches!(entry.get("Proxy").and_then(Value::as_str), Some("1"));

    // A verified proxy shell (often a similar-bytecode match) proves nothing
    // about the logic contract behind it.
    let mut record = if is_proxy && implementation.is_some() {
        base(VerificationStatus::Unknown).with_note(PROXY_ONLY_NOTE)
    } else if has_real_source(source) {
        base(VerificationStatus::AlreadyVerified)
    } else {
        base(VerificationStatus::NotVerified)
    };
    if let Some(implementation) = implementation {
        record = record.with_implementation(implementation.to_ascii_lowercase());
    }
    record
}

/// More than a couple of characters and not an empty-object placeholder.
fn has_real_source(source: &Value) -> bool {
    match source {
        Value::String(s) => {
            let s = s.trim();
            s.len() > 2 && s != "{}" && s != "{{}}"
        }
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

/// Classify the explorer's public address page.
pub fn classify_html_page(address: &str, html: &str, explorer_url: &str) -> VerificationRecord {
    let status = if HTML_VERIFIED.is_match(html) {
        VerificationStatus::AlreadyVerified
    } else if HTML_NOT_VERIFIED.is_match(html) {
        VerificationStatus::NotVerified
    } else {
        VerificationStatus::Unknown
    };
    VerificationRecord::new(address, status, StatusSource::HtmlHeuristic)
        .with_explorer(explorer_url)
        .with_note(HTML_NOTE)
        .with_raw(truncate(html, HTML_RAW_LIMIT))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
