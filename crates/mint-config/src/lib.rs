//! Mint Config - network presets and run configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Network used when `NETWORK` is not set.
pub const DEFAULT_NETWORK: &str = "Base Mainnet";

/// Router address shared by the public drop deployments.
pub const DEFAULT_DROP_ROUTER: &str = "0x00005EA00Ac477B1030CE78506496e8C2dE24bf5";

/// Fee recipient accepted by the public drop deployments.
pub const DEFAULT_FEE_RECIPIENT: &str = "0x0000a26b00c1F0DF003000390027140000fAa719";

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Signature used by the manual strategy when none is configured.
pub const DEFAULT_MINT_SIGNATURE: &str = "function mint(uint256)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkProfile,
    pub run: RunConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(skip)]
    pub overrides: OperatorOverrides,
}

/// Values set explicitly by the operator. They survive a network switch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorOverrides {
    pub rpc_url: Option<String>,
    pub gas_limit: Option<u64>,
    pub max_fee_gwei: Option<f64>,
    pub max_priority_fee_gwei: Option<f64>,
}

impl OperatorOverrides {
    fn apply(&self, network: &mut NetworkProfile, run: &mut RunConfig) {
        if let Some(rpc_url) = &self.rpc_url {
            network.rpc_url = rpc_url.clone();
        }
        if let Some(gas_limit) = self.gas_limit {
            run.gas_limit = gas_limit;
        }
        if let Some(max_fee) = self.max_fee_gwei {
            run.max_fee_gwei = Some(max_fee);
        }
        if let Some(max_priority) = self.max_priority_fee_gwei {
            run.max_priority_fee_gwei = Some(max_priority);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExplorerConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
}

impl ExplorerConfig {
    /// Explorer lookups need both an endpoint and a key.
    pub fn is_usable(&self) -> bool {
        !self.base_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeDefaults {
    pub max_fee_gwei: Option<f64>,
    pub max_priority_fee_gwei: Option<f64>,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkProfile {
    pub name: String,
    pub rpc_url: String,
    /// 0 means the chain id is read from the node.
    pub chain_id: u64,
    pub explorer: ExplorerConfig,
    pub use_eip1559: bool,
    pub fees: FeeDefaults,
    pub router: String,
    pub fee_recipient: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub contract: String,
    /// Native-currency decimal string, sent as the literal call value.
    pub mint_price: String,
    pub mint_quantity: u64,
    pub gas_limit: u64,
    pub use_eip1559: bool,
    pub max_fee_gwei: Option<f64>,
    pub max_priority_fee_gwei: Option<f64>,
    pub concurrency: usize,
    pub mint_signature: String,
    #[serde(default)]
    pub router: String,
    #[serde(default)]
    pub fee_recipient: String,
    #[serde(default)]
    pub nft_contract: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Read and reported; a single account execution is always one attempt.
    pub retry_attempts: u32,
    pub rpc_timeout_ms: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub batch_delay_ms: u64,
    pub log_level: String,
    pub json_logs: bool,
    pub activity_log_path: String,
    pub key_file_path: String,
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            rpc_timeout_ms: 20_000,
            confirmation_timeout_secs: 180,
            poll_interval_ms: 1_000,
            batch_delay_ms: 0,
            log_level: "info".to_string(),
            json_logs: false,
            activity_log_path: "activity.log".to_string(),
            key_file_path: "wallets.txt".to_string(),
            private_key: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            contract: String::new(),
            mint_price: "0".to_string(),
            mint_quantity: 1,
            gas_limit: 200_000,
            use_eip1559: true,
            max_fee_gwei: None,
            max_priority_fee_gwei: None,
            concurrency: 2,
            mint_signature: DEFAULT_MINT_SIGNATURE.to_string(),
            router: String::new(),
            fee_recipient: String::new(),
            nft_contract: None,
        }
    }
}

impl NetworkProfile {
    pub const PRESET_NAMES: &'static [&'static str] = &[
        "Ethereum Mainnet",
        "Base Mainnet",
        "Arbitrum One",
        "Hyperliquid EVM",
        "Custom / Manual",
    ];

    /// Look up a preset, reading endpoint and key overrides from the process environment.
    pub fn preset(name: &str) -> Option<Self> {
        Self::preset_with(name, &|key| std::env::var(key).ok())
    }

    /// Look up a preset using `lookup` for environment overrides.
    pub fn preset_with(name: &str, lookup: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let scan_key = |key: &str| var(key).or_else(|| var("SCAN_API_KEY")).unwrap_or_default();
        let chain_id = |key: &str| var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(0);

        let profile = match name {
            "Ethereum Mainnet" => Self {
                name: name.to_string(),
                rpc_url: or("ETH_MAINNET_RPC", "https://eth.llamarpc.com"),
                chain_id: 1,
                explorer: ExplorerConfig {
                    name: "Etherscan".to_string(),
                    base_url: "https://api.etherscan.io".to_string(),
                    api_key: scan_key("ETHERSCAN_API_KEY"),
                },
                use_eip1559: true,
                fees: FeeDefaults {
                    max_fee_gwei: Some(30.0),
                    max_priority_fee_gwei: Some(1.5),
                    gas_limit: 250_000,
                },
                router: DEFAULT_DROP_ROUTER.to_string(),
                fee_recipient: DEFAULT_FEE_RECIPIENT.to_string(),
            },
            "Base Mainnet" => Self {
                name: name.to_string(),
                rpc_url: or("BASE_MAINNET_RPC", "https://mainnet.base.org"),
                chain_id: 8453,
                explorer: ExplorerConfig {
                    name: "Basescan".to_string(),
                    base_url: "https://api.basescan.org".to_string(),
                    api_key: scan_key("BASESCAN_API_KEY"),
                },
                use_eip1559: true,
                fees: FeeDefaults {
                    max_fee_gwei: Some(2.0),
                    max_priority_fee_gwei: Some(1.0),
                    gas_limit: 180_000,
                },
                router: DEFAULT_DROP_ROUTER.to_string(),
                fee_recipient: DEFAULT_FEE_RECIPIENT.to_string(),
            },
            "Arbitrum One" => Self {
                name: name.to_string(),
                rpc_url: or("ARB_MAINNET_RPC", "https://arb1.arbitrum.io/rpc"),
                chain_id: 42161,
                explorer: ExplorerConfig {
                    name: "Arbiscan".to_string(),
                    base_url: "https://api.arbiscan.io".to_string(),
                    api_key: scan_key("ARBISCAN_API_KEY"),
                },
                use_eip1559: true,
                fees: FeeDefaults {
                    max_fee_gwei: Some(0.2),
                    max_priority_fee_gwei: Some(0.05),
                    gas_limit: 200_000,
                },
                router: DEFAULT_DROP_ROUTER.to_string(),
                fee_recipient: DEFAULT_FEE_RECIPIENT.to_string(),
            },
            // No getabi endpoint in most deployments; detection falls back to manual.
            "Hyperliquid EVM" => Self {
                name: name.to_string(),
                rpc_url: or("HL_RPC", "https://rpc.hyperliquid.xyz/evm"),
                chain_id: chain_id("HL_CHAIN_ID"),
                explorer: ExplorerConfig {
                    name: "Explorer API".to_string(),
                    base_url: var("HL_SCAN_BASEURL").unwrap_or_default(),
                    api_key: var("HL_SCAN_API_KEY").unwrap_or_default(),
                },
                use_eip1559: true,
                fees: FeeDefaults {
                    max_fee_gwei: Some(1.0),
                    max_priority_fee_gwei: Some(0.2),
                    gas_limit: 200_000,
                },
                router: or("HL_SEADROP_ROUTER", ZERO_ADDRESS),
                fee_recipient: or("HL_FEE_RECIPIENT", ZERO_ADDRESS),
            },
            "Custom / Manual" => Self {
                name: name.to_string(),
                rpc_url: var("RPC_URL").unwrap_or_default(),
                chain_id: chain_id("CHAIN_ID"),
                explorer: ExplorerConfig {
                    name: "Explorer API".to_string(),
                    base_url: var("SCAN_BASEURL").unwrap_or_default(),
                    api_key: var("SCAN_API_KEY").unwrap_or_default(),
                },
                use_eip1559: true,
                fees: FeeDefaults {
                    max_fee_gwei: None,
                    max_priority_fee_gwei: None,
                    gas_limit: 200_000,
                },
                router: or("SEA_DROP_ROUTER", DEFAULT_DROP_ROUTER),
                fee_recipient: or("FEE_RECIPIENT", DEFAULT_FEE_RECIPIENT),
            },
            _ => return None,
        };

        Some(profile)
    }
}

impl RunConfig {
    /// Reset the profile-derived fields. Router and fee recipient already set by
    /// the operator are kept.
    pub fn apply_profile(&mut self, profile: &NetworkProfile) {
        self.use_eip1559 = profile.use_eip1559;
        self.max_fee_gwei = profile.fees.max_fee_gwei;
        self.max_priority_fee_gwei = profile.fees.max_priority_fee_gwei;
        self.gas_limit = profile.fees.gas_limit;
        if self.router.trim().is_empty() {
            self.router = profile.router.clone();
        }
        if self.fee_recipient.trim().is_empty() {
            self.fee_recipient = profile.fee_recipient.clone();
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Token contract targeted by the router strategy.
    pub fn nft_contract(&self) -> &str {
        match self.nft_contract.as_deref() {
            Some(addr) if !addr.trim().is_empty() => addr,
            _ => &self.contract,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mint_quantity == 0 {
            anyhow::bail!("mint_quantity must be greater than 0");
        }
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.gas_limit == 0 {
            anyhow::bail!("gas_limit must be greater than 0");
        }
        match self.mint_price.trim().parse::<f64>() {
            Ok(price) if price.is_finite() && price >= 0.0 => {}
            _ => anyhow::bail!("mint_price must be a non-negative decimal, got: {}", self.mint_price),
        }
        for (field, fee) in [
            ("max_fee_gwei", self.max_fee_gwei),
            ("max_priority_fee_gwei", self.max_priority_fee_gwei),
        ] {
            if let Some(fee) = fee {
                if !fee.is_finite() || fee < 0.0 {
                    anyhow::bail!("{} must be a non-negative number, got: {}", field, fee);
                }
            }
        }
        for (field, addr) in [
            ("contract", self.contract.as_str()),
            ("router", self.router.as_str()),
            ("fee_recipient", self.fee_recipient.as_str()),
        ] {
            if !addr.trim().is_empty() && !is_hex_address(addr) {
                anyhow::bail!("{} is not a 0x-prefixed 20-byte address: {}", field, addr);
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.run.concurrency = config.run.concurrency.max(1);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build the configuration from `NAME=value` style variables.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let network_name = var("NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let mut network = NetworkProfile::preset_with(&network_name, lookup)
            .ok_or_else(|| anyhow::anyhow!("unknown network preset: {}", network_name))?;

        // Explicit settings win over the preset defaults.
        let overrides = OperatorOverrides {
            rpc_url: var("RPC_URL"),
            gas_limit: env_number(&var, "GAS_LIMIT")?,
            max_fee_gwei: env_number(&var, "MAX_FEE_GWEI")?,
            max_priority_fee_gwei: env_number(&var, "MAX_PRIORITY_GWEI")?,
        };

        let contract = var("CONTRACT_ADDRESS").unwrap_or_default();
        let mut run = RunConfig {
            nft_contract: var("NFT_CONTRACT").or_else(|| Some(contract.clone()).filter(|c| !c.is_empty())),
            contract,
            mint_price: var("MINT_PRICE").unwrap_or_else(|| "0".to_string()),
            mint_quantity: env_number(&var, "MINT_AMOUNT")?.unwrap_or(1),
            mint_signature: var("MINT_FUNC_SIG").unwrap_or_else(|| DEFAULT_MINT_SIGNATURE.to_string()),
            router: var("SEA_DROP_ROUTER").unwrap_or_default(),
            fee_recipient: var("FEE_RECIPIENT").unwrap_or_default(),
            concurrency: env_number(&var, "CONCURRENCY")?.unwrap_or(2),
            ..RunConfig::default()
        };
        run.apply_profile(&network);
        overrides.apply(&mut network, &mut run);
        let concurrency = run.concurrency;
        let run = run.with_concurrency(concurrency);

        let defaults = RuntimeConfig::default();
        let runtime = RuntimeConfig {
            retry_attempts: env_number(&var, "RETRY_ATTEMPTS")?.unwrap_or(defaults.retry_attempts),
            rpc_timeout_ms: env_number(&var, "RPC_TIMEOUT_MS")?.unwrap_or(defaults.rpc_timeout_ms),
            confirmation_timeout_secs: env_number(&var, "CONFIRMATION_TIMEOUT_SECS")?
                .unwrap_or(defaults.confirmation_timeout_secs),
            poll_interval_ms: env_number(&var, "POLL_INTERVAL_MS")?.unwrap_or(defaults.poll_interval_ms),
            batch_delay_ms: env_number(&var, "BATCH_DELAY_MS")?.unwrap_or(defaults.batch_delay_ms),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: var("JSON_LOGS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            activity_log_path: var("ACTIVITY_LOG").unwrap_or(defaults.activity_log_path),
            key_file_path: var("WALLETS_FILE").unwrap_or(defaults.key_file_path),
            private_key: var("PRIVATE_KEY"),
        };

        let config = Config { network, run, runtime, overrides };
        config.validate()?;
        Ok(config)
    }

    /// Switch to another preset, resetting the fields derived from the old one.
    /// Operator overrides are applied again on top of the new preset.
    pub fn switch_network(&mut self, name: &str) -> anyhow::Result<()> {
        let profile = NetworkProfile::preset(name)
            .ok_or_else(|| anyhow::anyhow!("unknown network preset: {}", name))?;
        self.run.apply_profile(&profile);
        self.network = profile;
        self.overrides.apply(&mut self.network, &mut self.run);
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let rpc_url = self.network.rpc_url.trim();
        if rpc_url.is_empty() {
            anyhow::bail!("rpc_url cannot be empty for network {}", self.network.name);
        }
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            anyhow::bail!("rpc_url must start with http:// or https://, got: {}", rpc_url);
        }
        if self.runtime.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        self.run.validate()
    }
}

fn env_number<T>(var: &dyn Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} is not a valid number '{}': {}", key, v, e))
        })
        .transpose()
}

/// `0x` followed by exactly 40 hex digits.
pub fn is_hex_address(value: &str) -> bool {
    let value = value.trim();
    value.len() == 42
        && (value.starts_with("0x") || value.starts_with("0X"))
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}
