//! Mint Core - call construction, preflight checks and multi-account mint execution

pub mod accounts;
pub mod activity_log;
pub mod chain_client;
pub mod contract_probe;
pub mod detector;
pub mod error;
pub mod metadata;
pub mod monitoring;
pub mod preflight;
pub mod revert;
pub mod runner;
pub mod strategy;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use accounts::{
    collect_credentials, env_account, load_accounts, load_from_runtime, load_key_file_accounts, read_key_file,
    wallet_status, Account, AccountKey, AccountStatus, Credential, WalletStatusSummary,
};
pub use activity_log::{ActivitySink, JsonlActivityLog};
pub use chain_client::{ChainClient, ChainClientConfig, EthersChainClient};
pub use contract_probe::{inspect_and_record, inspect_contract, rejected_record, ContractInfo, TokenStandard};
pub use detector::{rank_candidates, score, CandidateFunction, MintFunctionDetector, SCORING_RULES};
pub use error::{ChainError, MintError};
pub use metadata::{ContractMetadataResolver, ExplorerAbiResolver};
pub use monitoring::init_logging;
pub use preflight::{PreflightReport, TransactionPreflight};
pub use revert::{decode_revert, ErrorSet, RevertReason};
pub use runner::MultiAccountRunner;
pub use strategy::{
    parse_signature, CallStrategy, DetectedAutoStrategy, DropRouterStrategy, ManualSignatureStrategy,
    StrategyExecutor, StrategyKind,
};
pub use types::{FeeSettings, MintCall, MintReceipt, Outcome, RunSummary};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
