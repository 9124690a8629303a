//! Core types shared by the mint engine

use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{parse_ether, parse_units};
use mint_config::RunConfig;
use serde::Serialize;
use serde_json::json;

use crate::error::MintError;
use crate::revert::ErrorSet;

/// A fully built contract call, ready for preflight and broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Structured errors known to the target, used to decode reverts.
    pub error_set: ErrorSet,
}

impl MintCall {
    pub fn new(to: Address, data: impl Into<Bytes>, value: U256) -> Self {
        Self {
            to,
            data: data.into(),
            value,
            error_set: ErrorSet::None,
        }
    }

    /// A zero-value read-only call.
    pub fn view(to: Address, data: impl Into<Bytes>) -> Self {
        Self::new(to, data, U256::zero())
    }

    pub fn with_error_set(mut self, error_set: ErrorSet) -> Self {
        self.error_set = error_set;
        self
    }

    /// First four bytes of calldata, if present.
    pub fn selector(&self) -> Option<[u8; 4]> {
        let data = self.data.as_ref();
        if data.len() < 4 {
            return None;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        Some(selector)
    }
}

/// Fee parameters applied at broadcast time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeSettings {
    pub use_eip1559: bool,
    /// Ceiling per gas unit in wei; `None` lets the network decide.
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeSettings {
    pub fn from_run_config(run: &RunConfig) -> Result<Self, MintError> {
        if !run.use_eip1559 {
            return Ok(Self::default());
        }
        Ok(Self {
            use_eip1559: true,
            max_fee_per_gas: run.max_fee_gwei.map(gwei_to_wei).transpose()?,
            max_priority_fee_per_gas: run.max_priority_fee_gwei.map(gwei_to_wei).transpose()?,
        })
    }

    /// Worst-case per-gas cost used by the fund check.
    pub fn fee_ceiling(&self) -> U256 {
        self.max_fee_per_gas.unwrap_or_default()
    }
}

/// Confirmation data for a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub success: bool,
}

/// Result of one account's attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub title: String,
    /// Source label of the credential (`.env`, `wallets.txt:3`, ...).
    pub account: String,
    pub address: Option<Address>,
    pub success: bool,
    pub block_number: Option<u64>,
    pub tx_hash: Option<H256>,
    pub error: Option<String>,
    #[serde(skip)]
    pub error_kind: Option<&'static str>,
    pub duration_ms: u64,
}

impl Outcome {
    pub fn from_result(
        title: &str,
        account: &str,
        address: Option<Address>,
        result: Result<MintReceipt, MintError>,
        duration_ms: u64,
    ) -> Self {
        let mut outcome = Self {
            title: title.to_string(),
            account: account.to_string(),
            address,
            success: false,
            block_number: None,
            tx_hash: None,
            error: None,
            error_kind: None,
            duration_ms,
        };
        match result {
            Ok(receipt) => {
                outcome.success = true;
                outcome.block_number = Some(receipt.block_number);
                outcome.tx_hash = Some(receipt.tx_hash);
            }
            Err(err) => {
                if let MintError::MinedButReverted { tx_hash, .. } = &err {
                    outcome.tx_hash = Some(*tx_hash);
                }
                outcome.error_kind = Some(err.kind());
                outcome.error = Some(err.to_string());
            }
        }
        outcome
    }

    /// Activity log record of type `kind` (`multi_wallet`, `auto_single`, ...).
    pub fn to_record(&self, kind: &str) -> serde_json::Value {
        let mut record = json!({
            "type": kind,
            "title": self.title,
            "ok": self.success,
            "from": self.address.map(|a| format!("{:?}", a)).unwrap_or_else(|| self.account.clone()),
            "ms": self.duration_ms,
        });
        if let Some(block) = self.block_number {
            record["block"] = json!(block);
        }
        if let Some(tx_hash) = self.tx_hash {
            record["tx"] = json!(format!("{:?}", tx_hash));
        }
        if let Some(error) = &self.error {
            record["error"] = json!(error);
        }
        record
    }
}

/// Aggregate of a multi-account run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    /// Outcomes in completion order.
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    pub fn push(&mut self, outcome: Outcome) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Parse a decimal native-currency amount into wei.
pub fn parse_price(price: &str) -> Result<U256, MintError> {
    let trimmed = price.trim();
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    parse_ether(trimmed).map_err(|e| MintError::Config(format!("invalid mint price '{}': {}", price, e)))
}

pub fn gwei_to_wei(gwei: f64) -> Result<U256, MintError> {
    if !gwei.is_finite() || gwei < 0.0 {
        return Err(MintError::Config(format!("invalid gwei amount: {}", gwei)));
    }
    // Wei is the ninth decimal of a gwei; anything finer is rounded away.
    let amount: U256 = parse_units(format!("{:.9}", gwei), "gwei")
        .map_err(|e| MintError::Config(format!("invalid gwei amount {}: {}", gwei, e)))?
        .into();
    Ok(amount)
}

/// Parse a 0x-prefixed address, naming `field` in the error.
pub fn parse_address(field: &str, value: &str) -> Result<Address, MintError> {
    let trimmed = value.trim();
    if !mint_config::is_hex_address(trimmed) {
        return Err(MintError::Config(format!("{} is not a valid address: '{}'", field, value)));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| MintError::Config(format!("{} is not a valid address: {}", field, e)))
}

/// `0x1234…abcd` form used in status output.
pub fn short_address(address: &Address) -> String {
    let full = format!("{:?}", address);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0").unwrap(), U256::zero());
        assert_eq!(parse_price("").unwrap(), U256::zero());
        assert_eq!(parse_price("0.5").unwrap(), U256::exp10(17) * 5);
        assert!(parse_price("abc").is_err());
    }

    #[test]
    fn test_fee_settings_respect_fee_market_flag() {
        let mut run = RunConfig::default();
        run.max_fee_gwei = Some(2.5);
        run.max_priority_fee_gwei = Some(1.0);

        let fees = FeeSettings::from_run_config(&run).unwrap();
        assert!(fees.use_eip1559);
        assert_eq!(fees.max_fee_per_gas, Some(U256::from(2_500_000_000u64)));
        assert_eq!(fees.max_priority_fee_per_gas, Some(U256::from(1_000_000_000u64)));

        run.use_eip1559 = false;
        let legacy = FeeSettings::from_run_config(&run).unwrap();
        assert_eq!(legacy.fee_ceiling(), U256::zero());
    }

    #[test]
    fn test_gwei_to_wei_rounds_below_one_wei() {
        assert_eq!(gwei_to_wei(0.05).unwrap(), U256::from(50_000_000u64));
        assert_eq!(gwei_to_wei(1e-10).unwrap(), U256::zero());
        assert_eq!(gwei_to_wei(0.123456789123).unwrap(), U256::from(123_456_789u64));
        assert_eq!(gwei_to_wei(1.0000000006).unwrap(), U256::from(1_000_000_001u64));
        assert!(gwei_to_wei(-1.0).is_err());
        assert!(gwei_to_wei(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_address() {
        let address = parse_address("contract", "0x00005EA00Ac477B1030CE78506496e8C2dE24bf5").unwrap();
        assert_eq!(short_address(&address), "0x0000…4bf5");
        assert!(parse_address("contract", "0x1234").is_err());
        assert!(parse_address("contract", "").is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.push(Outcome::from_result(
            "Auto",
            ".env",
            None,
            Ok(MintReceipt { tx_hash: H256::zero(), block_number: 7, success: true }),
            10,
        ));
        summary.push(Outcome::from_result(
            "Auto",
            "wallets.txt:1",
            None,
            Err(MintError::Config("router invalid".into())),
            1,
        ));

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.total(), 2);

        let record = summary.outcomes[0].to_record("multi_wallet");
        assert_eq!(record["type"], "multi_wallet");
        assert_eq!(record["block"], 7);
        let failed = summary.outcomes[1].to_record("multi_wallet");
        assert_eq!(failed["ok"], false);
        assert!(failed["error"].as_str().unwrap().contains("router invalid"));
    }
}
