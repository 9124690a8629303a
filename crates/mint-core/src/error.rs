//! Error taxonomy for mint execution

use ethers::types::{Bytes, H256, U256};
use ethers::utils::format_ether;

/// Failure reported by a chain client primitive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The node answered with an execution error (revert, out of gas, ...).
    #[error("{message}")]
    Revert { message: String, data: Option<Bytes> },

    #[error("transport error: {0}")]
    Transport(String),
}

/// Terminal failure of one account attempt, or of a setup step before any attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MintError {
    #[error("invalid credential ({source_label}): {reason}")]
    InvalidCredential { source_label: String, reason: String },

    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("no candidate function: {0}")]
    NoCandidateFunction(String),

    #[error("insufficient funds: balance={} required={}", ether(.balance), ether(.required))]
    InsufficientFunds { balance: U256, required: U256 },

    #[error("preflight revert: {reason}")]
    PreflightRevert { reason: String },

    #[error("mined but reverted{}", suffix(.reason))]
    MinedButReverted { tx_hash: H256, reason: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MintError {
    /// Stable identifier used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            MintError::InvalidCredential { .. } => "invalid_credential",
            MintError::MetadataUnavailable(_) => "metadata_unavailable",
            MintError::NoCandidateFunction(_) => "no_candidate_function",
            MintError::InsufficientFunds { .. } => "insufficient_funds",
            MintError::PreflightRevert { .. } => "preflight_revert",
            MintError::MinedButReverted { .. } => "mined_but_reverted",
            MintError::Transport(_) => "transport",
            MintError::Config(_) => "config",
        }
    }
}

impl From<ChainError> for MintError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Revert { message, .. } => MintError::PreflightRevert { reason: message },
            ChainError::Transport(message) => MintError::Transport(message),
        }
    }
}

fn ether(value: &U256) -> String {
    format_ether(*value)
}

fn suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!(": {}", reason),
        _ => String::new(),
    }
}
