use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use ethers::types::Address;
use mint_config::{Config, NetworkProfile};
use mint_core::{
    env_account, inspect_and_record, load_from_runtime, load_key_file_accounts, wallet_status, Account, CallStrategy,
    ChainClient, ChainClientConfig, DetectedAutoStrategy, DropRouterStrategy, EthersChainClient, ExplorerAbiResolver,
    JsonlActivityLog, ManualSignatureStrategy, MintError, MintFunctionDetector, MultiAccountRunner, Outcome,
    StrategyExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn cli() -> Command {
    Command::new("mint-bot")
        .version(mint_core::version())
        .about("Multi-account NFT mint runner")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("YAML config file (defaults to environment / .env)"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NAME")
                .value_parser(NetworkProfile::PRESET_NAMES.to_vec())
                .help("Network preset to use"),
        )
        .subcommand(
            Command::new("status").about("Show loaded accounts").arg(
                Arg::new("online")
                    .long("online")
                    .action(ArgAction::SetTrue)
                    .help("Fetch balance and nonce for each account"),
            ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Check that an address is an NFT contract")
                .arg(Arg::new("address").value_name("ADDRESS").help("Defaults to the configured contract")),
        )
        .subcommand(Command::new("detect").about("Detect the mint function of the configured contract"))
        .subcommand(
            Command::new("mint")
                .about("Mint with every configured account")
                .arg(
                    Arg::new("strategy")
                        .short('s')
                        .long("strategy")
                        .value_parser(["auto", "manual", "drop-router"])
                        .default_value("auto"),
                )
                .arg(
                    Arg::new("single")
                        .long("single")
                        .action(ArgAction::SetTrue)
                        .help("Only use the PRIVATE_KEY account"),
                )
                .arg(Arg::new("signature").long("signature").value_name("SIG").help("Manual function signature"))
                .arg(Arg::new("router").long("router").value_name("ADDRESS"))
                .arg(Arg::new("fee-recipient").long("fee-recipient").value_name("ADDRESS"))
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let matches = cli().get_matches();

    let mut config = if let Some(config_file) = matches.get_one::<String>("config") {
        let mut config = Config::load_from_file(config_file)?;
        if config.runtime.private_key.is_none() {
            config.runtime.private_key = std::env::var("PRIVATE_KEY").ok().filter(|k| !k.trim().is_empty());
        }
        config
    } else {
        Config::load_from_env()?
    };
    if let Some(network) = matches.get_one::<String>("network") {
        config.switch_network(network)?;
        config.validate()?;
    }

    mint_core::init_logging(&config.runtime.log_level, config.runtime.json_logs)?;
    info!(
        version = mint_core::version(),
        network = %config.network.name,
        chain_id = config.network.chain_id,
        retry_attempts = config.runtime.retry_attempts,
        "Starting mint-bot"
    );

    let result = match matches.subcommand() {
        Some(("status", args)) => status(&config, args.get_flag("online")).await,
        Some(("inspect", args)) => inspect(&config, args.get_one::<String>("address")).await,
        Some(("detect", _)) => detect(&config).await,
        Some(("mint", args)) => mint(config, args).await,
        _ => Err(anyhow::anyhow!("unknown command")),
    };
    if let Err(e) = &result {
        mint_core::log_error!("mint-bot", "command_failed", format!("{:#}", e));
    }
    result
}

async fn connect(config: &Config) -> anyhow::Result<Arc<EthersChainClient>> {
    let client = EthersChainClient::connect(ChainClientConfig::from_config(config))
        .await
        .with_context(|| format!("Failed to connect to {}", config.network.rpc_url))?;
    Ok(Arc::new(client))
}

/// Simulated sender for detection: the first valid account, or the zero address.
fn first_valid_address(accounts: &[Account]) -> Address {
    accounts.iter().find_map(Account::address).unwrap_or_else(Address::zero)
}

async fn status(config: &Config, online: bool) -> anyhow::Result<()> {
    let accounts = load_from_runtime(&config.runtime)?;
    let client = if online { Some(connect(config).await?) } else { None };
    let summary = wallet_status(&accounts, client.as_deref().map(|c| c as &dyn ChainClient)).await;

    println!(
        "accounts: total={} valid={} invalid={} sample=[{}]",
        summary.total,
        summary.valid,
        summary.invalid,
        summary.sample.join(", ")
    );
    for account in &summary.accounts {
        match (&account.address, &account.error) {
            (Some(address), None) => println!(
                "  {:<16} {:?} balance={} nonce={}",
                account.source,
                address,
                account.balance.map(ethers::utils::format_ether).unwrap_or_else(|| "-".into()),
                account.nonce.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            ),
            (_, Some(error)) => println!("  {:<16} error: {}", account.source, error),
            (None, None) => println!("  {:<16} -", account.source),
        }
    }
    Ok(())
}

async fn inspect(config: &Config, address: Option<&String>) -> anyhow::Result<()> {
    let target = address.cloned().unwrap_or_else(|| config.run.contract.clone());
    if target.is_empty() {
        bail!("no contract address given and CONTRACT_ADDRESS is not set");
    }

    let client = connect(config).await?;
    let sink = JsonlActivityLog::new(&config.runtime.activity_log_path);
    let info = inspect_and_record(&*client, &sink, &target, &config.network.rpc_url).await?;

    println!(
        "{:?} name={} symbol={} standard={}",
        info.address,
        info.name.as_deref().unwrap_or("-"),
        info.symbol.as_deref().unwrap_or("-"),
        info.standard.as_str()
    );
    Ok(())
}

async fn detect(config: &Config) -> anyhow::Result<()> {
    let accounts = load_from_runtime(&config.runtime)?;
    let client = connect(config).await?;
    let detector = MintFunctionDetector::new(client, Arc::new(ExplorerAbiResolver::new(config.network.explorer.clone())?));

    match DetectedAutoStrategy::detect(&detector, &config.run, first_valid_address(&accounts)).await {
        Ok(strategy) => {
            let candidate = strategy.candidate();
            println!("detected {} (score {})", candidate.signature(), candidate.score);
            Ok(())
        }
        Err(MintError::MetadataUnavailable(reason)) => {
            warn!(reason = %reason, "Interface unavailable, use `mint --strategy manual`");
            println!("metadata unavailable: {}", reason);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn mint(mut config: Config, args: &ArgMatches) -> anyhow::Result<()> {
    if let Some(signature) = args.get_one::<String>("signature") {
        config.run.mint_signature = signature.clone();
    }
    if let Some(router) = args.get_one::<String>("router") {
        config.run.router = router.clone();
    }
    if let Some(fee_recipient) = args.get_one::<String>("fee-recipient") {
        config.run.fee_recipient = fee_recipient.clone();
    }
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        config.run = config.run.clone().with_concurrency(*concurrency);
    }
    config.validate()?;

    let single = args.get_flag("single");
    let accounts: Vec<Account> = if single {
        env_account(&config.runtime).into_iter().collect()
    } else {
        load_key_file_accounts(&config.runtime)?
    };
    if accounts.is_empty() {
        if single {
            bail!("PRIVATE_KEY is not set");
        }
        bail!("no accounts configured: add keys to {}", config.runtime.key_file_path);
    }
    // The environment key is preferred as the detection sender.
    let probe = env_account(&config.runtime)
        .and_then(|account| account.address())
        .unwrap_or_else(|| first_valid_address(&accounts));

    let client = connect(&config).await?;
    let strategy: Box<dyn CallStrategy> = match args.get_one::<String>("strategy").map(String::as_str) {
        Some("manual") => Box::new(ManualSignatureStrategy::from_run_config(&config.run)?),
        Some("drop-router") => Box::new(DropRouterStrategy::from_run_config(&config.run)?),
        _ => {
            let resolver = Arc::new(ExplorerAbiResolver::new(config.network.explorer.clone())?);
            let detector = MintFunctionDetector::new(client.clone(), resolver);
            match DetectedAutoStrategy::detect(&detector, &config.run, probe).await {
                Ok(strategy) => Box::new(strategy),
                Err(MintError::MetadataUnavailable(reason)) => {
                    warn!(reason = %reason, signature = %config.run.mint_signature, "Falling back to manual signature");
                    Box::new(ManualSignatureStrategy::from_run_config(&config.run)?)
                }
                Err(e) => return Err(e.into()),
            }
        }
    };

    let executor = StrategyExecutor::from_run_config(client, &config.run)?;
    let runner = MultiAccountRunner::new(
        Arc::new(executor),
        Arc::new(JsonlActivityLog::new(&config.runtime.activity_log_path)),
    )
    .with_batch_delay(Duration::from_millis(config.runtime.batch_delay_ms));

    if single {
        let outcome = runner.run_single(&accounts[0], strategy.as_ref()).await;
        print_outcome(&outcome);
        return Ok(());
    }

    let summary = runner.run(&accounts, strategy.as_ref(), config.run.concurrency).await;
    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }
    println!(
        "{}: {} succeeded, {} failed",
        strategy.title(),
        summary.success_count,
        summary.failure_count
    );
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    let who = outcome
        .address
        .map(|a| format!("{:?}", a))
        .unwrap_or_else(|| outcome.account.clone());
    match (&outcome.error, outcome.block_number) {
        (None, Some(block)) => println!("[ok]   {} block={} ({} ms)", who, block, outcome.duration_ms),
        (Some(error), _) => println!("[fail] {} {} ({} ms)", who, error, outcome.duration_ms),
        (None, None) => println!("[?]    {}", who),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_mint_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "mint-bot",
                "--network",
                "Arbitrum One",
                "mint",
                "--strategy",
                "drop-router",
                "--single",
                "--concurrency",
                "4",
            ])
            .unwrap();

        assert_eq!(matches.get_one::<String>("network").unwrap(), "Arbitrum One");
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "mint");
        assert_eq!(args.get_one::<String>("strategy").unwrap(), "drop-router");
        assert!(args.get_flag("single"));
        assert_eq!(*args.get_one::<usize>("concurrency").unwrap(), 4);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(cli().try_get_matches_from(["mint-bot", "mint", "--strategy", "fast"]).is_err());
        assert!(cli().try_get_matches_from(["mint-bot", "--network", "Mars", "status"]).is_err());
    }
}
