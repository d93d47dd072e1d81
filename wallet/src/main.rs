//! coin-wallet command line
//!
//! The seed is read from `WALLET_SEED` (hex) or `WALLET_MNEMONIC` plus an
//! optional `WALLET_PASSPHRASE`. Everything else comes from the environment
//! (see `WalletConfig::from_env`), with the global flags below taking
//! precedence.
//!
//! Usage:
//!   coin-wallet address                  # next receiving address
//!   coin-wallet discover                 # scan the network, show balance
//!   coin-wallet balance                  # stored balance
//!   coin-wallet send <ADDRESS> <AMOUNT>
//!   coin-wallet sendmany <ADDRESS,AMOUNT>...
//!   coin-wallet watch --interval-secs 10

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use coin_wallet::agent::build_agent;
use coin_wallet::config::AgentKind;
use coin_wallet::{Chain, CoinAccount, CoinType, DiscoveryReport, Recipient, Wallet, WalletConfig};
use dotenv::dotenv;

/// HD wallet for Bitcoin and Litecoin.
#[derive(Parser, Debug)]
#[command(name = "coin-wallet", version, about = "BIP44 wallet for Bitcoin and Litecoin")]
struct Cli {
    /// Coin to operate on (btc or ltc).
    #[arg(long, global = true)]
    coin: Option<CoinType>,

    /// Use the test network.
    #[arg(short = 't', long, global = true, conflicts_with = "mainnet")]
    testnet: bool,

    /// Use the main network.
    #[arg(long, global = true)]
    mainnet: bool,

    /// BIP44 account index.
    #[arg(long, global = true)]
    account: Option<u32>,

    /// Ledger database directory.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Blockchain data source.
    #[arg(short = 'A', long, global = true)]
    agent: Option<AgentArg>,

    /// Esplora API base URL.
    #[arg(long, global = true)]
    esplora_url: Option<String>,

    /// Coin daemon JSON-RPC URL.
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Coin daemon JSON-RPC user (the password is read from RPC_PASSWORD).
    #[arg(long, global = true)]
    rpc_user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum AgentArg {
    Esplora,
    Daemon,
}

impl From<AgentArg> for AgentKind {
    fn from(arg: AgentArg) -> Self {
        match arg {
            AgentArg::Esplora => AgentKind::Esplora,
            AgentArg::Daemon => AgentKind::Daemon,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show an address of the account.
    ///
    /// Without --index this is the next address past the stored watermark.
    Address {
        /// Use the internal (change) chain.
        #[arg(long)]
        change: bool,

        /// Derive this index instead of the next unused one.
        #[arg(long)]
        index: Option<u32>,
    },

    /// Scan the network for funded addresses and show the balance.
    #[command(alias = "sync")]
    Discover,

    /// Show the balance held in the ledger.
    Balance {
        /// Run discovery first.
        #[arg(long)]
        sync: bool,
    },

    /// Send coins to one address.
    Send {
        /// Recipient address.
        address: String,

        /// Amount in minor units (satoshis).
        amount: u64,

        #[command(flatten)]
        spend: SpendOptions,
    },

    /// Send coins to several addresses in one transaction.
    Sendmany {
        /// Recipients as ADDRESS,AMOUNT pairs, paid in the order given.
        #[arg(required = true, value_parser = parse_recipient)]
        recipients: Vec<Recipient>,

        #[command(flatten)]
        spend: SpendOptions,
    },

    /// Print the account extended public key.
    Xpub,

    /// Periodically discover and hand out a fresh receiving address.
    Watch {
        /// Seconds to sleep between discovery passes.
        #[arg(long, default_value_t = 2)]
        interval_secs: u64,
    },
}

#[derive(clap::Args, Debug)]
struct SpendOptions {
    /// Hex bytes carried in a null-data (OP_RETURN) output.
    #[arg(short = 'H', long)]
    hex_data: Option<String>,

    /// Fee per 1000 bytes in minor units, overriding the configured fee.
    #[arg(short = 'f', long)]
    fee_per_kb: Option<u64>,
}

impl SpendOptions {
    fn aux_data(&self) -> anyhow::Result<Option<Vec<u8>>> {
        self.hex_data
            .as_deref()
            .map(|data| hex::decode(data).context("--hex-data is not valid hex"))
            .transpose()
    }
}

fn parse_recipient(value: &str) -> Result<Recipient, String> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 2 {
        return Err("argument must be 'address,amount'".to_string());
    }
    let amount = parts[1]
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid amount '{}'", parts[1]))?;
    Ok(Recipient::new(parts[0].trim(), amount))
}

/// Environment variables with the command line flags applied on top
fn with_overrides(cli: &Cli, mut vars: HashMap<String, String>) -> HashMap<String, String> {
    if let Some(coin) = cli.coin {
        vars.insert("WALLET_COIN".to_string(), coin.to_string());
    }
    if cli.testnet {
        vars.insert("WALLET_NETWORK".to_string(), "testnet".to_string());
    }
    if cli.mainnet {
        vars.insert("WALLET_NETWORK".to_string(), "mainnet".to_string());
    }
    if let Some(account) = cli.account {
        vars.insert("WALLET_ACCOUNT".to_string(), account.to_string());
    }
    if let Some(db) = &cli.db {
        vars.insert("WALLET_DB".to_string(), db.to_string_lossy().into_owned());
    }
    if let Some(agent) = cli.agent {
        vars.insert("WALLET_AGENT".to_string(), AgentKind::from(agent).to_string());
    }
    if let Some(url) = &cli.esplora_url {
        vars.insert("ESPLORA_URL".to_string(), url.clone());
    }
    if let Some(url) = &cli.rpc_url {
        vars.insert("RPC_URL".to_string(), url.clone());
    }
    if let Some(user) = &cli.rpc_user {
        vars.insert("RPC_USER".to_string(), user.clone());
    }
    vars
}

fn open_wallet(vars: &HashMap<String, String>, config: &WalletConfig) -> anyhow::Result<Wallet> {
    if let Some(seed_hex) = vars.get("WALLET_SEED") {
        let seed = hex::decode(seed_hex.trim()).context("WALLET_SEED is not valid hex")?;
        return Ok(Wallet::new(seed, &config.db_path)?);
    }
    if let Some(phrase) = vars.get("WALLET_MNEMONIC") {
        let passphrase = vars.get("WALLET_PASSPHRASE").map(String::as_str).unwrap_or("");
        return Ok(Wallet::from_mnemonic(phrase, passphrase, &config.db_path)?);
    }
    bail!("no seed configured: set WALLET_SEED (hex) or WALLET_MNEMONIC")
}

fn print_report(report: &DiscoveryReport) {
    for scan in [&report.external, &report.internal] {
        println!(
            "{:?} chain: {} addresses scanned, last used {}, {} unspent outputs",
            scan.chain,
            scan.visited,
            scan.last_used
                .map(|index| index.to_string())
                .unwrap_or_else(|| "none".to_string()),
            scan.utxo_count
        );
    }
    println!("Last index: {}", report.watermark);
}

fn send(
    account: &mut CoinAccount,
    recipients: &[Recipient],
    spend: &SpendOptions,
) -> anyhow::Result<()> {
    let aux_data = spend.aux_data()?;
    account.discover()?;
    let receipt = account.send(recipients, aux_data.as_deref(), spend.fee_per_kb)?;
    println!(
        "{}",
        serde_json::json!({ "txId": receipt.txid, "rawTx": receipt.raw_tx })
    );
    Ok(())
}

fn watch(account: &mut CoinAccount, interval: Duration) -> anyhow::Result<()> {
    log::info!(
        "👀 Watching {} every {}s",
        account.identifier(),
        interval.as_secs()
    );
    loop {
        thread::sleep(interval);
        if let Err(e) = account.discover() {
            log::error!("❌ Discovery failed: {}", e);
        }

        match account.balance() {
            Ok(balance) => log::info!("💰 Balance: {}", balance),
            Err(e) => log::error!("❌ Balance unavailable: {}", e),
        }

        match account.new_external_address() {
            Ok(address) => log::info!("📬 New external address: {}", address),
            Err(e) => log::error!("❌ New external address: {}", e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let vars = with_overrides(&cli, env::vars().collect());
    let config = WalletConfig::from_map(&vars);

    let wallet = open_wallet(&vars, &config)?;
    let mut account = wallet.coin_account(config.coin, config.testnet, config.account)?;
    account.set_fee_per_kb(config.effective_fee_per_kb());
    account.set_gap_limit(config.gap_limit);
    account.set_agent(build_agent(&config)?);

    match &cli.command {
        Command::Address { change, index } => {
            let chain = if *change { Chain::Internal } else { Chain::External };
            let address = match (index, chain) {
                (Some(index), chain) => account.address(*index, chain)?,
                (None, Chain::External) => account.new_external_address()?,
                (None, Chain::Internal) => account.new_change_address()?,
            };
            println!("Address: {}", address);
        }
        Command::Discover => {
            println!("Syncing {} from the network...", account.identifier());
            let report = account.discover()?;
            print_report(&report);
            println!("Balance: {}", account.balance()?);
        }
        Command::Balance { sync } => {
            if *sync {
                account.discover()?;
            }
            println!("Balance: {}", account.balance()?);
        }
        Command::Send {
            address,
            amount,
            spend,
        } => {
            send(&mut account, &[Recipient::new(address.as_str(), *amount)], spend)?;
        }
        Command::Sendmany { recipients, spend } => {
            send(&mut account, recipients, spend)?;
        }
        Command::Xpub => {
            println!("{}", account.export_account_xpub());
        }
        Command::Watch { interval_secs } => {
            watch(&mut account, Duration::from_secs(*interval_secs))?;
        }
    }

    account.close()?;
    wallet.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_recipient() {
        let recipient = parse_recipient("mkeFURLRyDugRRP1kwKRcNBZwkVCPPmYkt,50000").unwrap();
        assert_eq!(recipient.address, "mkeFURLRyDugRRP1kwKRcNBZwkVCPPmYkt");
        assert_eq!(recipient.amount, 50_000);

        assert!(parse_recipient("mkeFURLRyDugRRP1kwKRcNBZwkVCPPmYkt").is_err());
        assert!(parse_recipient("a,1,2").is_err());
        assert!(parse_recipient("a,-5").is_err());
    }

    #[test]
    fn test_sendmany_keeps_argument_order() {
        let cli = parse(&["coin-wallet", "sendmany", "a,1", "b,2", "--hex-data", "beef"]);
        match cli.command {
            Command::Sendmany { recipients, spend } => {
                let addresses: Vec<_> = recipients.iter().map(|r| r.address.as_str()).collect();
                assert_eq!(addresses, ["a", "b"]);
                assert_eq!(spend.aux_data().unwrap(), Some(vec![0xbe, 0xef]));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sync_alias() {
        let cli = parse(&["coin-wallet", "sync"]);
        assert!(matches!(cli.command, Command::Discover));
    }

    #[test]
    fn test_send_requires_amount() {
        assert!(Cli::try_parse_from(["coin-wallet", "send", "addr"]).is_err());
        assert!(Cli::try_parse_from(["coin-wallet", "send", "addr", "1.5"]).is_err());
    }

    #[test]
    fn test_network_flags_conflict() {
        assert!(Cli::try_parse_from(["coin-wallet", "--testnet", "--mainnet", "xpub"]).is_err());
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = parse(&[
            "coin-wallet",
            "--coin",
            "ltc",
            "--mainnet",
            "--agent",
            "daemon",
            "--account",
            "2",
            "balance",
        ]);
        let env: HashMap<String, String> = [
            ("WALLET_COIN", "btc"),
            ("WALLET_NETWORK", "testnet"),
            ("RPC_PASSWORD", "secret"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = WalletConfig::from_map(&with_overrides(&cli, env));
        assert_eq!(config.coin, CoinType::Ltc);
        assert!(!config.testnet);
        assert_eq!(config.agent, AgentKind::Daemon);
        assert_eq!(config.account, 2);
        assert_eq!(config.rpc_url, "http://127.0.0.1:9332");
        assert_eq!(config.rpc_password, "secret");
    }

    #[test]
    fn test_invalid_hex_data_rejected() {
        let spend = SpendOptions {
            hex_data: Some("xyz".to_string()),
            fee_per_kb: None,
        };
        assert!(spend.aux_data().is_err());
    }

    #[test]
    fn test_missing_seed() {
        let vars = HashMap::new();
        let config = WalletConfig::default();
        assert!(open_wallet(&vars, &config).is_err());
    }
}
