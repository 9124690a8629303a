//! Pre-broadcast checks: gas sizing, fund sufficiency and dry-run

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

use crate::chain_client::ChainClient;
use crate::error::{ChainError, MintError};
use crate::revert::{decode_revert, truncate_reason};
use crate::types::MintCall;

/// Headroom added to node gas estimates, in percent.
pub const GAS_BUFFER_PERCENT: u64 = 120;

/// Gas limit a passing preflight settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightReport {
    pub gas_limit: U256,
    pub required_funds: U256,
}

/// Sequential, read-only checks run before every broadcast.
pub struct TransactionPreflight {
    client: Arc<dyn ChainClient>,
    /// Worst-case fee per gas unit; zero when no ceiling is configured.
    fee_ceiling: U256,
}

impl TransactionPreflight {
    pub fn new(client: Arc<dyn ChainClient>, fee_ceiling: U256) -> Self {
        Self { client, fee_ceiling }
    }

    /// Run gas sizing, the fund check and a dry-run, stopping at the first failure.
    pub async fn run(&self, from: Address, call: &MintCall, gas_limit_hint: U256) -> Result<PreflightReport, MintError> {
        let gas_limit = self.size_gas(from, call, gas_limit_hint).await;
        let required_funds = self.check_funds(from, call, gas_limit).await?;
        self.dry_run(from, call).await?;

        crate::log_preflight_result!(format!("{:?}", from), true, gas_limit.low_u64(), "ok");
        Ok(PreflightReport { gas_limit, required_funds })
    }

    /// Buffered estimate when it undercuts the hint, else the hint.
    pub async fn size_gas(&self, from: Address, call: &MintCall, gas_limit_hint: U256) -> U256 {
        match self.client.estimate_gas(from, call).await {
            Ok(estimate) => {
                let gas_limit = buffered_gas_limit(estimate, gas_limit_hint);
                debug!(estimate = %estimate, hint = %gas_limit_hint, gas_limit = %gas_limit, "Sized gas limit");
                gas_limit
            }
            Err(e) => {
                debug!(error = %e, hint = %gas_limit_hint, "Gas estimation failed, using hint");
                gas_limit_hint
            }
        }
    }

    /// Returns the required amount on success.
    pub async fn check_funds(&self, from: Address, call: &MintCall, gas_limit: U256) -> Result<U256, MintError> {
        let balance = self.client.get_balance(from).await.map_err(MintError::from)?;
        let required = call
            .value
            .saturating_add(self.fee_ceiling.saturating_mul(gas_limit));

        if balance < required {
            crate::log_preflight_result!(format!("{:?}", from), false, gas_limit.low_u64(), "insufficient funds");
            return Err(MintError::InsufficientFunds { balance, required });
        }
        Ok(required)
    }

    pub async fn dry_run(&self, from: Address, call: &MintCall) -> Result<(), MintError> {
        match self.client.simulate(from, call).await {
            Ok(_) => Ok(()),
            Err(ChainError::Revert { message, data }) => {
                let reason = decode_revert(call.error_set, data.as_deref(), &message).to_short_string();
                crate::log_preflight_result!(format!("{:?}", from), false, 0u64, reason.as_str());
                Err(MintError::PreflightRevert { reason })
            }
            Err(ChainError::Transport(message)) => Err(MintError::Transport(truncate_reason(&message))),
        }
    }

    /// Re-simulate a call that was mined but reverted, to recover a reason.
    pub async fn explain_revert(&self, from: Address, call: &MintCall) -> Option<String> {
        match self.client.simulate(from, call).await {
            Ok(_) => None,
            Err(ChainError::Revert { message, data }) => {
                Some(decode_revert(call.error_set, data.as_deref(), &message).to_short_string())
            }
            Err(ChainError::Transport(_)) => None,
        }
    }
}

/// `estimate * 1.2`, used only when strictly below `hint`.
pub fn buffered_gas_limit(estimate: U256, hint: U256) -> U256 {
    let buffered = estimate.saturating_mul(U256::from(GAS_BUFFER_PERCENT)) / 100;
    if buffered < hint {
        buffered
    } else {
        hint
    }
}
