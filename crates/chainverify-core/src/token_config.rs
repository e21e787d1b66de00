//! Token launch configuration checks.
//!
//! Validates the flat `KEY: value` map a launch form submits before any
//! deployment is attempted, and converts fee percentages to basis points.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::address::is_valid_address;

/// 100% in basis points.
pub const MAX_SIDE_BPS: u64 = 10_000;

const WALLET_FIELDS: [&str; 4] = ["OWNER", "MARKETING_WALLET", "DEV_WALLET", "PLATFORM_WALLET"];
const ROUTER_FIELD: &str = "ROUTER_ADDRESS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenConfigError {
    #[error("{0} missing")]
    MissingAddress(&'static str),

    #[error("{0} invalid")]
    InvalidAddress(&'static str),

    #[error("Token name/symbol missing")]
    NameOrSymbolMissing,

    #[error("TOTAL_SUPPLY missing")]
    SupplyMissing,

    #[error("{0} invalid or missing")]
    InvalidFee(&'static str),

    #[error("Total {0} fees exceed 100%")]
    SideTotalExceeded(&'static str),
}

/// Fees for one trade side, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSchedule {
    pub marketing: u64,
    pub dev: u64,
    pub lp: u64,
}

impl FeeSchedule {
    /// Saturates, so any oversized component still reads as over 100%.
    pub fn total(&self) -> u64 {
        self.marketing.saturating_add(self.dev).saturating_add(self.lp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedTokenConfig {
    pub ok: bool,
    pub buy_fees: FeeSchedule,
    pub sell_fees: FeeSchedule,
    /// Whether a router address had to be supplied.
    pub router_required: bool,
}

/// Percent → basis points, `floor(p * 100)`.
///
/// Accepts JSON numbers and numeric strings. Negative, non-finite, empty or
/// non-numeric input yields `None`. Values beyond `u64` clamp to `u64::MAX`.
pub fn to_basis_points(percent: &Value) -> Option<u64> {
    let p = match percent {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if !p.is_finite() || p < 0.0 {
        return None;
    }
    Some((p * 100.0).floor() as u64)
}

/// Local development chains deploy their own router.
pub fn is_local_rpc(rpc_url: Option<&str>) -> bool {
    rpc_url.is_some_and(|url| {
        url.contains("127.0.0.1") || url.contains("localhost") || url.contains("8545")
    })
}

/// Validate a launch configuration against the RPC the backend is wired to.
///
/// Checks run in a fixed order and the first failure is reported.
pub fn validate_token_config(
    body: &Map<String, Value>,
    rpc_url: Option<&str>,
) -> Result<ValidatedTokenConfig, TokenConfigError> {
    let router_required = !is_local_rpc(rpc_url);
    let address_fields = WALLET_FIELDS
        .iter()
        .copied()
        .chain(router_required.then_some(ROUTER_FIELD));

    for field in address_fields {
        match body.get(field) {
            None | Some(Value::Null) => return Err(TokenConfigError::MissingAddress(field)),
            Some(Value::String(s)) if s.is_empty() => {
                return Err(TokenConfigError::MissingAddress(field))
            }
            Some(Value::String(s)) if is_valid_address(s) => {}
            Some(_) => return Err(TokenConfigError::InvalidAddress(field)),
        }
    }

    if !is_present(body.get("TOKEN_NAME")) || !is_present(body.get("TOKEN_SYMBOL")) {
        return Err(TokenConfigError::NameOrSymbolMissing);
    }
    if !is_present(body.get("TOTAL_SUPPLY")) {
        return Err(TokenConfigError::SupplyMissing);
    }

    let fee = |field: &'static str| {
        body.get(field)
            .and_then(to_basis_points)
            .ok_or(TokenConfigError::InvalidFee(field))
    };
    let buy_fees = FeeSchedule {
        marketing: fee("BUY_MARKETING")?,
        dev: fee("BUY_DEV")?,
        lp: fee("BUY_LP")?,
    };
    let sell_fees = FeeSchedule {
        marketing: fee("SELL_MARKETING")?,
        dev: fee("SELL_DEV")?,
        lp: fee("SELL_LP")?,
    };

    if buy_fees.total() > MAX_SIDE_BPS {
        return Err(TokenConfigError::SideTotalExceeded("BUY"));
    }
    if sell_fees.total() > MAX_SIDE_BPS {
        return Err(TokenConfigError::SideTotalExceeded("SELL"));
    }

    Ok(ValidatedTokenConfig {
        ok: true,
        buy_fees,
        sell_fees,
        router_required,
    })
}

/// Non-null, non-empty, non-zero, non-false.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}
