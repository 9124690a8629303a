//! Call strategies and the shared execution path
//!
//! A strategy only decides *what* call to make. [`StrategyExecutor`] owns the
//! common path every strategy goes through: preflight, broadcast, wait for the
//! receipt and check its status.

use ethers::abi::{self, Function, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use ethers::utils::id;
use mint_config::RunConfig;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::chain_client::ChainClient;
use crate::detector::{canonical_signature, encode_mint_call, CandidateFunction, MintFunctionDetector};
use crate::error::{ChainError, MintError};
use crate::preflight::TransactionPreflight;
use crate::revert::ErrorSet;
use crate::types::{parse_address, parse_price, FeeSettings, MintCall, MintReceipt};

const MINT_PUBLIC_SIGNATURE: &str = "mintPublic(address,address,address,uint256)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    DetectedAuto,
    ManualSignature,
    DropRouterPublic,
}

impl StrategyKind {
    /// Prefix of single-account activity record types.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DetectedAuto => "auto",
            StrategyKind::ManualSignature => "manual",
            StrategyKind::DropRouterPublic => "drop_router",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the mint call for one account.
pub trait CallStrategy: Send + Sync {
    /// Run title used in logs and activity records.
    fn title(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    fn build_call(&self, minter: Address) -> Result<MintCall, MintError>;

    /// Re-simulate after a mined revert to recover a reason.
    fn explain_mined_revert(&self) -> bool {
        false
    }
}

/// Calls the function picked by [`MintFunctionDetector`].
pub struct DetectedAutoStrategy {
    title: String,
    candidate: CandidateFunction,
    contract: Address,
    quantity: U256,
    value: U256,
}

impl DetectedAutoStrategy {
    pub fn new(candidate: CandidateFunction, contract: Address, quantity: U256, value: U256) -> Self {
        Self {
            title: format!("Auto {}", candidate.signature()),
            candidate,
            contract,
            quantity,
            value,
        }
    }

    /// Detect the mint function with `probe` as the simulated sender.
    pub async fn detect(detector: &MintFunctionDetector, run: &RunConfig, probe: Address) -> Result<Self, MintError> {
        let contract = parse_address("contract", &run.contract)?;
        let quantity = U256::from(run.mint_quantity);
        let value = parse_price(&run.mint_price)?;
        let candidate = detector.detect(contract, probe, quantity, value).await?;
        Ok(Self::new(candidate, contract, quantity, value))
    }

    pub fn candidate(&self) -> &CandidateFunction {
        &self.candidate
    }
}

impl CallStrategy for DetectedAutoStrategy {
    fn title(&self) -> &str {
        &self.title
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::DetectedAuto
    }

    fn build_call(&self, _minter: Address) -> Result<MintCall, MintError> {
        self.candidate.build_call(self.contract, self.quantity, self.value)
    }
}

/// Calls an operator-supplied function signature.
pub struct ManualSignatureStrategy {
    title: String,
    function: Function,
    contract: Address,
    quantity: U256,
    value: U256,
}

impl ManualSignatureStrategy {
    pub fn new(function: Function, contract: Address, quantity: U256, value: U256) -> Self {
        Self {
            title: format!("Manual {}", canonical_signature(&function)),
            function,
            contract,
            quantity,
            value,
        }
    }

    pub fn from_run_config(run: &RunConfig) -> Result<Self, MintError> {
        let function = parse_signature(&run.mint_signature)?;
        let contract = parse_address("contract", &run.contract)?;
        Ok(Self::new(function, contract, U256::from(run.mint_quantity), parse_price(&run.mint_price)?))
    }
}

impl CallStrategy for ManualSignatureStrategy {
    fn title(&self) -> &str {
        &self.title
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ManualSignature
    }

    fn build_call(&self, _minter: Address) -> Result<MintCall, MintError> {
        encode_mint_call(&self.function, self.contract, self.quantity, self.value)
    }
}

/// Parse `function mint(uint256)`, `mint(uint256)` or either with `payable`.
pub fn parse_signature(signature: &str) -> Result<Function, MintError> {
    let trimmed = signature.trim();
    if trimmed.is_empty() {
        return Err(MintError::Config("mint signature is empty".into()));
    }
    let normalized = if trimmed.starts_with("function ") {
        trimmed.to_string()
    } else {
        format!("function {}", trimmed)
    };

    let parsed = abi::parse_abi(&[normalized.as_str()])
        .map_err(|e| MintError::Config(format!("invalid mint signature '{}': {}", signature, e)))?;
    parsed
        .functions()
        .next()
        .cloned()
        .ok_or_else(|| MintError::Config(format!("invalid mint signature '{}'", signature)))
}

/// Public mint through a drop router: `mintPublic(nft, feeRecipient, minter, quantity)`.
pub struct DropRouterStrategy {
    router: Result<Address, String>,
    fee_recipient: Result<Address, String>,
    nft_contract: Address,
    quantity: U256,
    value: U256,
}

impl DropRouterStrategy {
    /// Router problems are reported per account by [`CallStrategy::build_call`].
    pub fn from_run_config(run: &RunConfig) -> Result<Self, MintError> {
        let nft_contract = parse_address("nft contract", run.nft_contract())?;

        let router = parse_address("router", &run.router)
            .map_err(|_| format!("router invalid: '{}' is not an address", run.router))
            .and_then(|router| {
                if router.is_zero() {
                    Err("router invalid: router is not set".to_string())
                } else if router == nft_contract {
                    Err("router invalid: router equals the NFT contract".to_string())
                } else {
                    Ok(router)
                }
            });
        let fee_recipient = parse_address("fee recipient", &run.fee_recipient)
            .map_err(|_| format!("fee recipient invalid: '{}'", run.fee_recipient));

        Ok(Self {
            router,
            fee_recipient,
            nft_contract,
            quantity: U256::from(run.mint_quantity),
            value: parse_price(&run.mint_price)?,
        })
    }
}

impl CallStrategy for DropRouterStrategy {
    fn title(&self) -> &str {
        "Drop router mintPublic"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::DropRouterPublic
    }

    fn build_call(&self, minter: Address) -> Result<MintCall, MintError> {
        let router = self.router.clone().map_err(MintError::Config)?;
        let fee_recipient = self.fee_recipient.clone().map_err(MintError::Config)?;

        let mut data = id(MINT_PUBLIC_SIGNATURE).to_vec();
        data.extend(abi::encode(&[
            Token::Address(self.nft_contract),
            Token::Address(fee_recipient),
            Token::Address(minter),
            Token::Uint(self.quantity),
        ]));

        Ok(MintCall::new(router, data, self.value).with_error_set(ErrorSet::DropRouter))
    }

    fn explain_mined_revert(&self) -> bool {
        true
    }
}

/// Shared per-account path: preflight, broadcast, confirm, check status.
pub struct StrategyExecutor {
    client: Arc<dyn ChainClient>,
    preflight: TransactionPreflight,
    fees: FeeSettings,
    gas_limit_hint: U256,
}

impl StrategyExecutor {
    pub fn new(client: Arc<dyn ChainClient>, fees: FeeSettings, gas_limit_hint: U256) -> Self {
        Self {
            preflight: TransactionPreflight::new(client.clone(), fees.fee_ceiling()),
            client,
            fees,
            gas_limit_hint,
        }
    }

    pub fn from_run_config(client: Arc<dyn ChainClient>, run: &RunConfig) -> Result<Self, MintError> {
        let fees = FeeSettings::from_run_config(run)?;
        Ok(Self::new(client, fees, U256::from(run.gas_limit)))
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// One attempt for `wallet`. Nothing is broadcast unless preflight passes.
    pub async fn execute(&self, strategy: &dyn CallStrategy, wallet: &LocalWallet) -> Result<MintReceipt, MintError> {
        let minter = wallet.address();
        let call = strategy.build_call(minter)?;
        let report = self.preflight.run(minter, &call, self.gas_limit_hint).await?;

        let tx_hash = self
            .client
            .broadcast(wallet, &call, report.gas_limit, &self.fees)
            .await
            .map_err(transport)?;
        crate::log_mint_broadcast!(strategy.title(), format!("{:?}", minter), tx_hash, report.gas_limit.low_u64());

        let receipt = self.client.wait_for_receipt(tx_hash).await.map_err(transport)?;
        if receipt.success {
            return Ok(receipt);
        }

        let reason = if strategy.explain_mined_revert() {
            self.preflight.explain_revert(minter, &call).await
        } else {
            None
        };
        debug!(tx_hash = ?tx_hash, reason = ?reason, "Transaction mined but reverted");
        Err(MintError::MinedButReverted { tx_hash, reason })
    }
}

/// After signing, every chain failure is a transport failure.
fn transport(err: ChainError) -> MintError {
    match err {
        ChainError::Transport(message) | ChainError::Revert { message, .. } => MintError::Transport(message),
    }
}
