//! Account loading and wallet status

use anyhow::Context;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use futures::future::join_all;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::chain_client::ChainClient;
use crate::types::short_address;

/// Label of the key taken from the environment.
pub const ENV_SOURCE_LABEL: &str = ".env";

/// Number of addresses shown in status samples.
const SAMPLE_SIZE: usize = 3;

/// A raw secret and where it came from.
#[derive(Clone)]
pub struct Credential {
    pub source: String,
    pub secret: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential").field("source", &self.source).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum AccountKey {
    Valid(LocalWallet),
    Invalid(String),
}

/// A credential after parsing. Invalid ones are kept so they show up in results.
#[derive(Debug, Clone)]
pub struct Account {
    pub source: String,
    pub key: AccountKey,
}

impl Account {
    pub fn from_credential(credential: &Credential) -> Self {
        let key = match credential.secret.trim().parse::<LocalWallet>() {
            Ok(wallet) => AccountKey::Valid(wallet),
            Err(e) => AccountKey::Invalid(format!("invalid private key: {}", e)),
        };
        Self {
            source: credential.source.clone(),
            key,
        }
    }

    pub fn address(&self) -> Option<Address> {
        match &self.key {
            AccountKey::Valid(wallet) => Some(wallet.address()),
            AccountKey::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.key, AccountKey::Valid(_))
    }

    /// Short address for valid accounts, the source label otherwise.
    pub fn label(&self) -> String {
        self.address().map(|a| short_address(&a)).unwrap_or_else(|| self.source.clone())
    }
}

/// Non-blank trimmed lines of a key file, labeled `<file name>:<n>`. A missing file yields nothing.
pub fn read_key_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Credential>> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "Key file not found");
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, secret)| Credential {
            source: format!("{}:{}", file_name, index + 1),
            secret: secret.to_string(),
        })
        .collect())
}

/// Environment key first, then key file entries. Duplicates are kept.
pub fn collect_credentials(env_key: Option<&str>, file_credentials: Vec<Credential>) -> Vec<Credential> {
    let mut credentials = Vec::with_capacity(file_credentials.len() + 1);
    if let Some(secret) = env_key.map(str::trim).filter(|s| !s.is_empty()) {
        credentials.push(Credential {
            source: ENV_SOURCE_LABEL.to_string(),
            secret: secret.to_string(),
        });
    }
    credentials.extend(file_credentials);
    credentials
}

pub fn load_accounts(credentials: &[Credential]) -> Vec<Account> {
    credentials.iter().map(Account::from_credential).collect()
}

/// The environment key as an account, if one is set.
pub fn env_account(runtime: &mint_config::RuntimeConfig) -> Option<Account> {
    collect_credentials(runtime.private_key.as_deref(), Vec::new())
        .first()
        .map(Account::from_credential)
}

/// Accounts of a multi-account run: key file entries only.
pub fn load_key_file_accounts(runtime: &mint_config::RuntimeConfig) -> anyhow::Result<Vec<Account>> {
    let accounts = load_accounts(&read_key_file(&runtime.key_file_path)?);
    info!(
        path = %runtime.key_file_path,
        total = accounts.len(),
        valid = accounts.iter().filter(|a| a.is_valid()).count(),
        "Loaded key file accounts"
    );
    Ok(accounts)
}

/// Every known account: the environment key, then the key file.
pub fn load_from_runtime(runtime: &mint_config::RuntimeConfig) -> anyhow::Result<Vec<Account>> {
    let file_credentials = read_key_file(&runtime.key_file_path)?;
    let credentials = collect_credentials(runtime.private_key.as_deref(), file_credentials);
    let accounts = load_accounts(&credentials);
    info!(
        total = accounts.len(),
        valid = accounts.iter().filter(|a| a.is_valid()).count(),
        "Loaded accounts"
    );
    Ok(accounts)
}

/// Per-account line of a wallet status report.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatus {
    pub source: String,
    pub address: Option<Address>,
    pub valid: bool,
    pub error: Option<String>,
    pub balance: Option<U256>,
    pub nonce: Option<U256>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletStatusSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Short addresses of the first valid accounts.
    pub sample: Vec<String>,
    pub accounts: Vec<AccountStatus>,
}

/// Count accounts and, when a client is given, fetch balance and nonce concurrently.
pub async fn wallet_status(accounts: &[Account], client: Option<&dyn ChainClient>) -> WalletStatusSummary {
    let statuses = join_all(accounts.iter().map(|account| account_status(account, client))).await;

    let valid = statuses.iter().filter(|s| s.valid).count();
    WalletStatusSummary {
        total: statuses.len(),
        valid,
        invalid: statuses.len() - valid,
        sample: accounts
            .iter()
            .filter_map(Account::address)
            .take(SAMPLE_SIZE)
            .map(|a| short_address(&a))
            .collect(),
        accounts: statuses,
    }
}

async fn account_status(account: &Account, client: Option<&dyn ChainClient>) -> AccountStatus {
    let mut status = AccountStatus {
        source: account.source.clone(),
        address: account.address(),
        valid: account.is_valid(),
        error: None,
        balance: None,
        nonce: None,
    };

    match (&account.key, client) {
        (AccountKey::Invalid(reason), _) => status.error = Some(reason.clone()),
        (AccountKey::Valid(wallet), Some(client)) => {
            let address = wallet.address();
            let (balance, nonce) = tokio::join!(client.get_balance(address), client.get_nonce(address));
            match (balance, nonce) {
                (Ok(balance), Ok(nonce)) => {
                    status.balance = Some(balance);
                    status.nonce = Some(nonce);
                }
                (Err(e), _) | (_, Err(e)) => status.error = Some(e.to_string()),
            }
        }
        (AccountKey::Valid(_), None) => {}
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockChainClient, TEST_KEYS};
    use std::io::Write;

    #[test]
    fn test_key_file_labels_and_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", TEST_KEYS[0]).unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "  0x{}  ", TEST_KEYS[1]).unwrap();
        writeln!(file, "not-a-key").unwrap();

        let credentials = read_key_file(file.path()).unwrap();
        let file_name = file.path().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(credentials.len(), 3);
        assert_eq!(credentials[1].source, format!("{}:2", file_name));
        assert_eq!(credentials[1].secret, format!("0x{}", TEST_KEYS[1]));

        let accounts = load_accounts(&credentials);
        assert!(accounts[0].is_valid());
        assert!(accounts[1].is_valid());
        assert!(!accounts[2].is_valid());
    }

    #[test]
    fn test_missing_key_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_key_file(dir.path().join("wallets.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_env_key_comes_first_and_duplicates_are_kept() {
        let file = vec![Credential { source: "wallets.txt:1".into(), secret: TEST_KEYS[0].into() }];
        let credentials = collect_credentials(Some(TEST_KEYS[0]), file);

        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0].source, ENV_SOURCE_LABEL);
        let accounts = load_accounts(&credentials);
        assert_eq!(accounts[0].address(), accounts[1].address());

        assert!(collect_credentials(Some("  "), Vec::new()).is_empty());
    }

    #[test]
    fn test_multi_account_source_excludes_env_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", TEST_KEYS[1]).unwrap();
        writeln!(file, "{}", TEST_KEYS[2]).unwrap();
        let runtime = mint_config::RuntimeConfig {
            key_file_path: file.path().display().to_string(),
            private_key: Some(TEST_KEYS[0].to_string()),
            ..Default::default()
        };

        let multi = load_key_file_accounts(&runtime).unwrap();
        assert_eq!(multi.len(), 2);
        assert!(multi.iter().all(|a| a.source != ENV_SOURCE_LABEL));

        let single = env_account(&runtime).unwrap();
        assert_eq!(single.source, ENV_SOURCE_LABEL);
        assert!(single.is_valid());

        assert_eq!(load_from_runtime(&runtime).unwrap().len(), 3);
        let without_env = mint_config::RuntimeConfig { private_key: None, ..runtime };
        assert!(env_account(&without_env).is_none());
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = Credential { source: ".env".into(), secret: TEST_KEYS[0].into() };
        assert!(!format!("{:?}", credential).contains(TEST_KEYS[0]));
    }

    #[tokio::test]
    async fn test_wallet_status_with_network_check() {
        let credentials = vec![
            Credential { source: "wallets.txt:1".into(), secret: TEST_KEYS[0].into() },
            Credential { source: "wallets.txt:2".into(), secret: "bad".into() },
            Credential { source: "wallets.txt:3".into(), secret: TEST_KEYS[1].into() },
        ];
        let accounts = load_accounts(&credentials);
        let client = MockChainClient::new();

        let summary = wallet_status(&accounts, Some(&client)).await;
        assert_eq!((summary.total, summary.valid, summary.invalid), (3, 2, 1));
        assert_eq!(summary.sample.len(), 2);
        assert_eq!(summary.accounts[0].balance, Some(U256::exp10(20)));
        assert_eq!(summary.accounts[0].nonce, Some(U256::zero()));
        assert!(summary.accounts[1].error.as_ref().unwrap().contains("invalid private key"));

        let offline = wallet_status(&accounts, None).await;
        assert!(offline.accounts[0].balance.is_none());
    }
}
