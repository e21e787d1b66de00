//! Classification of verifier CLI output.
//!
//! The verification toolchain only reports in free text, so every pattern
//! that depends on its wording lives here. Classification is total: any
//! `(output, exit code)` pair maps to exactly one status.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::record::VerificationStatus;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid regex"));

static ALREADY_VERIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)already\s+(?:been\s+)?verified").expect("valid regex"));

static API_KEY_MISSING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        api[\s_-]?(?:key|token)[^\n]{0,60}?(?:missing|empty|not\s+(?:set|found|provided|configured)|undefined)
        | \b(?:missing|empty|no)\s+(?:\w+\s+)?api[\s_-]?(?:key|token)
        ",
    )
    .expect("valid regex")
});

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>()\[\]]+"#).expect("valid regex"));

/// Status plus best-effort explorer link extracted from CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: VerificationStatus,
    pub explorer: Option<String>,
}

/// Normalize line endings to `\n` and drop terminal colour codes.
pub fn normalize_output(raw: &str) -> String {
    let stripped = ANSI_ESCAPE.replace_all(raw, "");
    stripped.replace("\r\n", "\n").replace('\r', "\n")
}

/// Pick the most explorer-looking URL in `text`.
///
/// URLs mentioning `scan` or `#code` win over the first URL found.
pub fn extract_explorer_url(text: &str) -> Option<String> {
    let urls: Vec<&str> = URL
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '`']))
        .collect();
    urls.iter()
        .find(|u| u.contains("scan") || u.contains("#code"))
        .or_else(|| urls.first())
        .map(|u| u.to_string())
}

/// Classify verifier output.
///
/// `exit_code` is `None` when the process was killed by a signal.
/// "already verified" wins over every other pattern and over the exit code.
pub fn classify_output(output: &str, exit_code: Option<i32>) -> Classification {
    let text = normalize_output(output);

    if ALREADY_VERIFIED.is_match(&text) {
        return Classification {
            status: VerificationStatus::AlreadyVerified,
            explorer: extract_explorer_url(&text),
        };
    }
    if API_KEY_MISSING.is_match(&text) {
        return Classification {
            status: VerificationStatus::ApiKeyMissing,
            explorer: None,
        };
    }
    if exit_code != Some(0) {
        return Classification {
            status: VerificationStatus::Failed,
            explorer: None,
        };
    }
    Classification {
        status: VerificationStatus::Ok,
        explorer: extract_explorer_url(&text),
    }
}
