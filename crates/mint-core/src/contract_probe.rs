//! Target contract inspection: bytecode check, name/symbol and ERC-165 probes

use ethers::abi::{self, ParamType, Token};
use ethers::types::Address;
use ethers::utils::id;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::activity_log::ActivitySink;
use crate::chain_client::ChainClient;
use crate::error::MintError;
use crate::types::{parse_address, MintCall};

pub const ERC721_INTERFACE_ID: [u8; 4] = [0x80, 0xac, 0x58, 0xcd];
pub const ERC1155_INTERFACE_ID: [u8; 4] = [0xd9, 0xb6, 0x7a, 0x26];

const NOT_AN_ADDRESS: &str = "invalid address (not 0x...)";
const EMPTY_BYTECODE: &str = "address is not a contract (empty bytecode)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenStandard {
    Erc721,
    Erc1155,
    Unknown,
}

impl TokenStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStandard::Erc721 => "ERC721",
            TokenStandard::Erc1155 => "ERC1155",
            TokenStandard::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractInfo {
    pub address: Address,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub standard: TokenStandard,
}

impl ContractInfo {
    /// `contract_set` activity record for an accepted contract.
    pub fn to_record(&self, rpc: &str) -> serde_json::Value {
        json!({
            "type": "contract_set",
            "ok": true,
            "address": format!("{:?}", self.address),
            "standard": self.standard.as_str(),
            "name": self.name,
            "symbol": self.symbol,
            "rpc": rpc,
        })
    }
}

/// `contract_set` activity record for a rejected input.
pub fn rejected_record(input: &str, reason: &str, rpc: &str) -> serde_json::Value {
    json!({
        "type": "contract_set",
        "ok": false,
        "reason": reason,
        "address": input.trim(),
        "rpc": rpc,
    })
}

/// Inspect `input` and append a `contract_set` record whether it is accepted or not.
pub async fn inspect_and_record(
    client: &dyn ChainClient,
    sink: &dyn ActivitySink,
    input: &str,
    rpc: &str,
) -> Result<ContractInfo, MintError> {
    let result = inspect_contract(client, input).await;
    let record = match &result {
        Ok(info) => info.to_record(rpc),
        Err(MintError::Config(reason)) => rejected_record(input, reason, rpc),
        Err(e) => rejected_record(input, &e.to_string(), rpc),
    };
    if let Err(e) = sink.append(&record) {
        warn!(error = %e, "Failed to append activity record");
    }
    result
}

/// Validate `input` as a deployed contract and read what it exposes.
pub async fn inspect_contract(client: &dyn ChainClient, input: &str) -> Result<ContractInfo, MintError> {
    let address = parse_address("contract", input).map_err(|_| MintError::Config(NOT_AN_ADDRESS.to_string()))?;

    // A failed code lookup counts as empty code.
    let code = client.get_code(address).await.unwrap_or_default();
    if code.as_ref().is_empty() {
        return Err(MintError::Config(EMPTY_BYTECODE.to_string()));
    }

    let name = read_string(client, address, "name()").await;
    let symbol = read_string(client, address, "symbol()").await;
    let standard = if supports_interface(client, address, ERC721_INTERFACE_ID).await {
        TokenStandard::Erc721
    } else if supports_interface(client, address, ERC1155_INTERFACE_ID).await {
        TokenStandard::Erc1155
    } else {
        TokenStandard::Unknown
    };

    info!(
        address = ?address,
        name = ?name,
        symbol = ?symbol,
        standard = standard.as_str(),
        "Contract inspected"
    );
    Ok(ContractInfo { address, name, symbol, standard })
}

async fn read_string(client: &dyn ChainClient, address: Address, signature: &str) -> Option<String> {
    let call = MintCall::view(address, id(signature).to_vec());
    let output = client.simulate(Address::zero(), &call).await.ok()?;
    match abi::decode(&[ParamType::String], output.as_ref()) {
        Ok(tokens) => match tokens.into_iter().next() {
            Some(Token::String(value)) => Some(value),
            _ => None,
        },
        Err(e) => {
            debug!(signature, error = %e, "Undecodable string return");
            None
        }
    }
}

async fn supports_interface(client: &dyn ChainClient, address: Address, interface_id: [u8; 4]) -> bool {
    let mut data = id("supportsInterface(bytes4)").to_vec();
    data.extend(abi::encode(&[Token::FixedBytes(interface_id.to_vec())]));
    let call = MintCall::view(address, data);

    match client.simulate(Address::zero(), &call).await {
        Ok(output) => matches!(
            abi::decode(&[ParamType::Bool], output.as_ref()).ok().and_then(|t| t.into_iter().next()),
            Some(Token::Bool(true))
        ),
        Err(_) => false,
    }
}
