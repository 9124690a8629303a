//! Chain access for the mint engine
//!
//! [`ChainClient`] is the seam between the engine and a node. The production
//! implementation, [`EthersChainClient`], talks JSON-RPC over HTTP, signs
//! transactions locally with the account's wallet and submits them through
//! `eth_sendRawTransaction`. Receipts are polled until a confirmation timeout.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockId, BlockNumber, Bytes, Eip1559TransactionRequest, TransactionRequest, TxHash, U256,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::ChainError;
use crate::types::{FeeSettings, MintCall, MintReceipt};

/// Node primitives used by preflight, strategies and status checks.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Pending-block transaction count.
    async fn get_nonce(&self, address: Address) -> Result<U256, ChainError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError>;

    async fn estimate_gas(&self, from: Address, call: &MintCall) -> Result<U256, ChainError>;

    /// Dry-run `call` from `from` without changing chain state.
    async fn simulate(&self, from: Address, call: &MintCall) -> Result<Bytes, ChainError>;

    /// Sign `call` with `signer` and submit it. Returns the transaction hash.
    async fn broadcast(
        &self,
        signer: &LocalWallet,
        call: &MintCall,
        gas_limit: U256,
        fees: &FeeSettings,
    ) -> Result<TxHash, ChainError>;

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<MintReceipt, ChainError>;
}

/// Connection settings for [`EthersChainClient`].
#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    pub rpc_url: String,
    /// Expected chain id; `0` reads it from the node.
    pub chain_id: u64,
    pub request_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl ChainClientConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id: 0,
            request_timeout: Duration::from_secs(20),
            confirmation_timeout: Duration::from_secs(180),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn from_config(config: &mint_config::Config) -> Self {
        Self::new(config.network.rpc_url.clone())
            .with_chain_id(config.network.chain_id)
            .with_request_timeout(Duration::from_millis(config.runtime.rpc_timeout_ms))
            .with_confirmation_timeout(Duration::from_secs(config.runtime.confirmation_timeout_secs))
            .with_poll_interval(Duration::from_millis(config.runtime.poll_interval_ms))
    }
}

/// JSON-RPC backed [`ChainClient`].
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
    config: ChainClientConfig,
    chain_id: u64,
}

impl EthersChainClient {
    /// Build the provider and resolve the chain id.
    pub async fn connect(config: ChainClientConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let url = reqwest::Url::parse(&config.rpc_url)
            .with_context(|| format!("Invalid RPC URL: {}", config.rpc_url))?;
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let provider = Provider::new(Http::new_with_client(url, http_client)).interval(config.poll_interval);

        let chain_id = if config.chain_id == 0 {
            provider
                .get_chainid()
                .await
                .context("Failed to fetch chain ID from node")?
                .as_u64()
        } else {
            config.chain_id
        };

        info!(rpc_url = %config.rpc_url, chain_id, "Connected to chain");

        Ok(Self {
            provider: Arc::new(provider),
            config,
            chain_id,
        })
    }

    fn call_request(from: Address, call: &MintCall) -> TypedTransaction {
        TransactionRequest::new()
            .from(from)
            .to(call.to)
            .value(call.value)
            .data(call.data.clone())
            .into()
    }

    async fn build_transaction(
        &self,
        from: Address,
        call: &MintCall,
        gas_limit: U256,
        fees: &FeeSettings,
    ) -> Result<TypedTransaction, ChainError> {
        let nonce = self.get_nonce(from).await?;
        debug!(from = ?from, nonce = %nonce, "Using nonce");

        if fees.use_eip1559 {
            let (max_fee, max_priority_fee) = match (fees.max_fee_per_gas, fees.max_priority_fee_per_gas) {
                (Some(max_fee), Some(priority)) => (max_fee, priority),
                (max_fee, priority) => {
                    let (estimated_max, estimated_priority) = self
                        .provider
                        .estimate_eip1559_fees(None)
                        .await
                        .map_err(transport_error)?;
                    (max_fee.unwrap_or(estimated_max), priority.unwrap_or(estimated_priority))
                }
            };
            debug!(max_fee = %max_fee, max_priority_fee = %max_priority_fee, "Using EIP-1559 fees");

            Ok(Eip1559TransactionRequest::new()
                .from(from)
                .to(call.to)
                .value(call.value)
                .data(call.data.clone())
                .gas(gas_limit)
                .nonce(nonce)
                .max_fee_per_gas(max_fee)
                .max_priority_fee_per_gas(max_priority_fee)
                .chain_id(self.chain_id)
                .into())
        } else {
            let gas_price = self.provider.get_gas_price().await.map_err(transport_error)?;
            debug!(gas_price = %gas_price, "Using legacy gas price");

            Ok(TransactionRequest::new()
                .from(from)
                .to(call.to)
                .value(call.value)
                .data(call.data.clone())
                .gas(gas_limit)
                .nonce(nonce)
                .gas_price(gas_price)
                .chain_id(self.chain_id)
                .into())
        }
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider.get_balance(address, None).await.map_err(transport_error)
    }

    async fn get_nonce(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_transaction_count(address, Some(BlockId::Number(BlockNumber::Pending)))
            .await
            .map_err(transport_error)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        self.provider.get_code(address, None).await.map_err(transport_error)
    }

    async fn estimate_gas(&self, from: Address, call: &MintCall) -> Result<U256, ChainError> {
        let tx = Self::call_request(from, call);
        self.provider.estimate_gas(&tx, None).await.map_err(execution_error)
    }

    async fn simulate(&self, from: Address, call: &MintCall) -> Result<Bytes, ChainError> {
        let tx = Self::call_request(from, call);
        self.provider.call(&tx, None).await.map_err(execution_error)
    }

    async fn broadcast(
        &self,
        signer: &LocalWallet,
        call: &MintCall,
        gas_limit: U256,
        fees: &FeeSettings,
    ) -> Result<TxHash, ChainError> {
        let wallet = signer.clone().with_chain_id(self.chain_id);
        let tx = self.build_transaction(wallet.address(), call, gas_limit, fees).await?;

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| ChainError::Transport(format!("failed to sign transaction: {}", e)))?;
        let signed_tx = tx.rlp_signed(&signature);

        let pending = self
            .provider
            .send_raw_transaction(signed_tx)
            .await
            .map_err(transport_error)?;

        let tx_hash = *pending;
        info!(tx_hash = ?tx_hash, from = ?wallet.address(), "Transaction submitted");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<MintReceipt, ChainError> {
        let timeout = self.config.confirmation_timeout;
        let start_time = Instant::now();
        let mut interval = time::interval(self.config.poll_interval);

        loop {
            if start_time.elapsed() >= timeout {
                return Err(ChainError::Transport(format!(
                    "confirmation timeout after {}s for {:?}",
                    timeout.as_secs(),
                    tx_hash
                )));
            }

            interval.tick().await;

            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let Some(block_number) = receipt.block_number else {
                        debug!(tx_hash = ?tx_hash, "Receipt without block number, still pending");
                        continue;
                    };
                    let success = receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false);
                    return Ok(MintReceipt {
                        tx_hash,
                        block_number: block_number.as_u64(),
                        success,
                    });
                }
                Ok(None) => {
                    debug!(
                        tx_hash = ?tx_hash,
                        elapsed_secs = start_time.elapsed().as_secs(),
                        "Transaction not yet confirmed"
                    );
                }
                Err(e) => {
                    warn!(tx_hash = ?tx_hash, error = %e, "Failed to fetch receipt, retrying");
                }
            }
        }
    }
}

fn transport_error(err: ProviderError) -> ChainError {
    ChainError::Transport(err.to_string())
}

/// Node-side execution errors carry a JSON-RPC error body; anything else is transport.
fn execution_error(err: ProviderError) -> ChainError {
    match err.as_error_response() {
        Some(response) => ChainError::Revert {
            message: response.message.clone(),
            data: response.as_revert_data(),
        },
        None => transport_error(err),
    }
}
