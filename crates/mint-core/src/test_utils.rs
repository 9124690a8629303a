//! Scripted test doubles for the chain, explorer and activity log seams

use async_trait::async_trait;
use ethers::abi::Function;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TxHash, H256, U256};
use ethers::utils::keccak256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::activity_log::ActivitySink;
use crate::chain_client::ChainClient;
use crate::error::{ChainError, MintError};
use crate::metadata::ContractMetadataResolver;
use crate::types::{FeeSettings, MintCall, MintReceipt};

/// Well-known development keys, distinct addresses.
pub const TEST_KEYS: [&str; 4] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
];

/// Deterministic address from a small integer.
pub fn address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn wallet(index: usize) -> LocalWallet {
    TEST_KEYS[index].parse().unwrap()
}

/// Parse a human-readable signature into an ABI function.
pub fn function(signature: &str) -> Function {
    let abi = ethers::abi::parse_abi(&[signature]).unwrap();
    abi.functions().next().unwrap().clone()
}

/// What the mock saw, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Estimate(Address),
    Simulate(Address, [u8; 4]),
    Broadcast(Address),
    Confirmed(Address),
}

/// In-memory chain. Every read succeeds unless scripted otherwise.
pub struct MockChainClient {
    default_balance: U256,
    balances: HashMap<Address, U256>,
    gas_estimate: Option<U256>,
    code: HashMap<Address, Bytes>,
    reverts: HashMap<[u8; 4], ChainError>,
    view_results: HashMap<[u8; 4], Bytes>,
    mined_revert: Option<ChainError>,
    confirm_delays: HashMap<Address, Duration>,
    pending: Mutex<HashMap<TxHash, Address>>,
    events: Mutex<Vec<ChainEvent>>,
    broadcasts: AtomicUsize,
    simulations: AtomicUsize,
    block_number: u64,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            default_balance: U256::exp10(20),
            balances: HashMap::new(),
            gas_estimate: Some(U256::from(100_000u64)),
            code: HashMap::new(),
            reverts: HashMap::new(),
            view_results: HashMap::new(),
            mined_revert: None,
            confirm_delays: HashMap::new(),
            pending: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            broadcasts: AtomicUsize::new(0),
            simulations: AtomicUsize::new(0),
            block_number: 1_000,
        }
    }

    pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.balances.insert(address, balance);
        self
    }

    /// `None` makes every estimate fail.
    pub fn with_gas_estimate(mut self, estimate: Option<U256>) -> Self {
        self.gas_estimate = estimate;
        self
    }

    pub fn with_code(mut self, address: Address, code: Vec<u8>) -> Self {
        self.code.insert(address, Bytes::from(code));
        self
    }

    /// Simulations of calls with `selector` revert with `message`.
    pub fn with_revert(mut self, selector: [u8; 4], message: &str) -> Self {
        self.reverts.insert(
            selector,
            ChainError::Revert { message: message.to_string(), data: None },
        );
        self
    }

    /// Simulations of calls with `selector` revert with `data`.
    pub fn with_revert_data(mut self, selector: [u8; 4], data: Vec<u8>) -> Self {
        self.reverts.insert(
            selector,
            ChainError::Revert { message: "execution reverted".to_string(), data: Some(Bytes::from(data)) },
        );
        self
    }

    pub fn with_view_result(mut self, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.view_results.insert(selector, Bytes::from(output));
        self
    }

    /// Receipts report failure and later simulations from the sender revert with `data`.
    pub fn with_mined_revert(mut self, data: Vec<u8>) -> Self {
        self.mined_revert = Some(ChainError::Revert {
            message: "execution reverted".to_string(),
            data: Some(Bytes::from(data)),
        });
        self
    }

    /// Hold the receipt of `address`'s transaction for `delay`.
    pub fn with_confirm_delay(mut self, address: Address, delay: Duration) -> Self {
        self.confirm_delays.insert(address, delay);
        self
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn simulation_count(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: ChainEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn has_broadcast(&self, from: Address) -> bool {
        self.pending.lock().unwrap().values().any(|a| *a == from)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        Ok(self.balances.get(&address).copied().unwrap_or(self.default_balance))
    }

    async fn get_nonce(&self, address: Address) -> Result<U256, ChainError> {
        let sent = self.pending.lock().unwrap().values().filter(|a| **a == address).count();
        Ok(U256::from(sent))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn estimate_gas(&self, from: Address, _call: &MintCall) -> Result<U256, ChainError> {
        self.record(ChainEvent::Estimate(from));
        self.gas_estimate
            .ok_or_else(|| ChainError::Revert { message: "gas required exceeds allowance".into(), data: None })
    }

    async fn simulate(&self, from: Address, call: &MintCall) -> Result<Bytes, ChainError> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        let selector = call.selector().unwrap_or_default();
        self.record(ChainEvent::Simulate(from, selector));

        if let Some(err) = &self.mined_revert {
            if self.has_broadcast(from) {
                return Err(err.clone());
            }
        }
        if let Some(err) = self.reverts.get(&selector) {
            return Err(err.clone());
        }
        Ok(self.view_results.get(&selector).cloned().unwrap_or_default())
    }

    async fn broadcast(
        &self,
        signer: &LocalWallet,
        _call: &MintCall,
        _gas_limit: U256,
        _fees: &FeeSettings,
    ) -> Result<TxHash, ChainError> {
        let from = signer.address();
        let sequence = self.broadcasts.fetch_add(1, Ordering::SeqCst);
        self.record(ChainEvent::Broadcast(from));

        let mut preimage = from.as_bytes().to_vec();
        preimage.extend_from_slice(&sequence.to_be_bytes());
        let tx_hash = H256::from(keccak256(preimage));
        self.pending.lock().unwrap().insert(tx_hash, from);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<MintReceipt, ChainError> {
        let from = self
            .pending
            .lock()
            .unwrap()
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| ChainError::Transport(format!("unknown transaction {:?}", tx_hash)))?;

        if let Some(delay) = self.confirm_delays.get(&from) {
            tokio::time::sleep(*delay).await;
        }
        self.record(ChainEvent::Confirmed(from));

        Ok(MintReceipt {
            tx_hash,
            block_number: self.block_number,
            success: self.mined_revert.is_none(),
        })
    }
}

/// Resolver that returns a fixed interface, or nothing.
pub struct StaticMetadataResolver {
    functions: Option<Vec<Function>>,
    lookups: AtomicUsize,
}

impl StaticMetadataResolver {
    pub fn new(signatures: &[&str]) -> Self {
        Self {
            functions: Some(signatures.iter().map(|s| function(s)).collect()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self { functions: None, lookups: AtomicUsize::new(0) }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractMetadataResolver for StaticMetadataResolver {
    async fn fetch_interface(&self, _address: Address) -> Result<Vec<Function>, MintError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.functions
            .clone()
            .ok_or_else(|| MintError::MetadataUnavailable("no explorer configured".into()))
    }
}

/// Activity sink that keeps records in memory, optionally failing every append.
#[derive(Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<serde_json::Value>>,
    failing: bool,
}

impl MemoryActivityLog {
    pub fn failing() -> Self {
        Self { records: Mutex::new(Vec::new()), failing: true }
    }

    pub fn records(&self) -> Vec<serde_json::Value> {
        self.records.lock().unwrap().clone()
    }
}

impl ActivitySink for MemoryActivityLog {
    fn append(&self, record: &serde_json::Value) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("activity log unavailable");
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
