//! Contract interface lookup through block explorer APIs

use async_trait::async_trait;
use ethers::abi::Function;
use ethers::types::Address;
use mint_config::ExplorerConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::MintError;

const EXPLORER_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of a contract's ABI functions.
#[async_trait]
pub trait ContractMetadataResolver: Send + Sync {
    /// Functions declared by `address`, in interface encounter order.
    async fn fetch_interface(&self, address: Address) -> Result<Vec<Function>, MintError>;
}

/// Etherscan-compatible `getabi` client.
pub struct ExplorerAbiResolver {
    client: reqwest::Client,
    explorer: ExplorerConfig,
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl ExplorerAbiResolver {
    pub fn new(explorer: ExplorerConfig) -> Result<Self, MintError> {
        let client = reqwest::Client::builder()
            .timeout(EXPLORER_TIMEOUT)
            .build()
            .map_err(|e| MintError::Transport(format!("failed to build explorer client: {}", e)))?;
        Ok(Self { client, explorer })
    }

    fn endpoint(&self) -> String {
        format!("{}/api", self.explorer.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContractMetadataResolver for ExplorerAbiResolver {
    async fn fetch_interface(&self, address: Address) -> Result<Vec<Function>, MintError> {
        if !self.explorer.is_usable() {
            return Err(MintError::MetadataUnavailable(format!(
                "{} base URL or API key not configured",
                self.explorer.name
            )));
        }

        let address_param = format!("{:?}", address);
        debug!(explorer = %self.explorer.name, address = %address_param, "Fetching contract ABI");

        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("module", "contract"),
                ("action", "getabi"),
                ("address", address_param.as_str()),
                ("apikey", self.explorer.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MintError::MetadataUnavailable(format!("explorer request failed: {}", e)))?;

        let body: ExplorerResponse = response
            .json()
            .await
            .map_err(|e| MintError::MetadataUnavailable(format!("invalid explorer response: {}", e)))?;

        if body.status != "1" {
            let detail = body.result.as_str().map(str::to_string).unwrap_or_default();
            warn!(
                explorer = %self.explorer.name,
                message = %body.message,
                detail = %detail,
                "Explorer did not return an ABI"
            );
            return Err(MintError::MetadataUnavailable(format!(
                "{}: {} {}",
                self.explorer.name, body.message, detail
            )
            .trim()
            .to_string()));
        }

        let abi_json = body
            .result
            .as_str()
            .ok_or_else(|| MintError::MetadataUnavailable("explorer result is not an ABI string".into()))?;
        parse_interface(abi_json)
    }
}

/// Parse a JSON ABI, keeping function entries in declaration order.
pub fn parse_interface(abi_json: &str) -> Result<Vec<Function>, MintError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(abi_json)
        .map_err(|e| MintError::MetadataUnavailable(format!("ABI is not valid JSON: {}", e)))?;

    let mut functions = Vec::new();
    for entry in entries {
        if entry.get("type").and_then(|t| t.as_str()) != Some("function") {
            continue;
        }
        match serde_json::from_value::<Function>(entry) {
            Ok(function) => functions.push(function),
            Err(e) => debug!(error = %e, "Skipping undecodable ABI entry"),
        }
    }
    Ok(functions)
}
