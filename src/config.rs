//! Wallet configuration from environment variables
//!
//! Selects the coin, network, account, ledger location and data source.
//! Defaults to Bitcoin testnet through mempool.space.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::discover::ADDRESS_GAP_LIMIT;
use crate::params::CoinType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Esplora,
    Daemon,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Esplora => write!(f, "esplora"),
            AgentKind::Daemon => write!(f, "daemon"),
        }
    }
}

#[derive(Clone)]
pub struct WalletConfig {
    pub coin: CoinType,
    pub testnet: bool,
    /// sled database directory
    pub db_path: PathBuf,
    pub account: u32,
    pub agent: AgentKind,
    /// Esplora API base URL
    pub esplora_url: String,
    /// Coin daemon JSON-RPC endpoint and credentials
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    /// Overrides the coin's default fee per kilobyte
    pub fee_per_kb: Option<u64>,
    pub gap_limit: u32,
}

// keeps the RPC password out of logs
impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("coin", &self.coin)
            .field("testnet", &self.testnet)
            .field("db_path", &self.db_path)
            .field("account", &self.account)
            .field("agent", &self.agent)
            .field("esplora_url", &self.esplora_url)
            .field("rpc_url", &self.rpc_url)
            .field("rpc_user", &self.rpc_user)
            .field("fee_per_kb", &self.fee_per_kb)
            .field("gap_limit", &self.gap_limit)
            .finish_non_exhaustive()
    }
}

pub fn default_esplora_url(coin: CoinType, testnet: bool) -> &'static str {
    match (coin, testnet) {
        (CoinType::Btc, false) => "https://mempool.space/api",
        (CoinType::Btc, true) => "https://mempool.space/testnet/api",
        (CoinType::Ltc, false) => "https://litecoinspace.org/api",
        (CoinType::Ltc, true) => "https://litecoinspace.org/testnet/api",
    }
}

pub fn default_rpc_url(coin: CoinType, testnet: bool) -> &'static str {
    match (coin, testnet) {
        (CoinType::Btc, false) => "http://127.0.0.1:8332",
        (CoinType::Btc, true) => "http://127.0.0.1:18332",
        (CoinType::Ltc, false) => "http://127.0.0.1:9332",
        (CoinType::Ltc, true) => "http://127.0.0.1:19332",
    }
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WALLET_COIN`: "btc" (default) or "ltc"
    /// - `WALLET_NETWORK`: "testnet" (default) or "mainnet"
    /// - `WALLET_DB`: ledger database path (default `./wallet.db`)
    /// - `WALLET_ACCOUNT`: BIP44 account index (default 0)
    /// - `WALLET_AGENT`: "esplora" (default) or "daemon"
    /// - `ESPLORA_URL`, `RPC_URL`, `RPC_USER`, `RPC_PASSWORD`
    /// - `WALLET_FEE_PER_KB`: fee override in minor units per 1000 bytes
    /// - `WALLET_GAP_LIMIT`: discovery gap limit (default 5)
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Litecoin mainnet through a local litecoind
    /// WALLET_COIN=ltc WALLET_NETWORK=mainnet WALLET_AGENT=daemon \
    ///     RPC_USER=rpc RPC_PASSWORD=secret coin-wallet balance
    /// ```
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let coin = match lookup("WALLET_COIN") {
            None => CoinType::Btc,
            Some(value) => value.parse::<CoinType>().unwrap_or_else(|e| {
                log::warn!("⚠️  {}, defaulting to BTC", e);
                CoinType::Btc
            }),
        };

        let network_str = lookup("WALLET_NETWORK")
            .unwrap_or_else(|| "testnet".to_string())
            .to_lowercase();
        let testnet = match network_str.as_str() {
            "mainnet" | "main" => false,
            "testnet" | "test" | "" => true,
            other => {
                log::warn!("⚠️  Unknown network '{}', defaulting to testnet", other);
                true
            }
        };
        log::info!(
            "🌐 Using {} {}",
            coin,
            if testnet { "testnet" } else { "mainnet" }
        );

        let agent = match lookup("WALLET_AGENT")
            .unwrap_or_else(|| "esplora".to_string())
            .to_lowercase()
            .as_str()
        {
            "esplora" | "" => AgentKind::Esplora,
            "daemon" | "rpc" => AgentKind::Daemon,
            other => {
                log::warn!("⚠️  Unknown agent '{}', defaulting to esplora", other);
                AgentKind::Esplora
            }
        };

        let esplora_url = lookup("ESPLORA_URL")
            .unwrap_or_else(|| default_esplora_url(coin, testnet).to_string());
        let rpc_url =
            lookup("RPC_URL").unwrap_or_else(|| default_rpc_url(coin, testnet).to_string());
        match agent {
            AgentKind::Esplora => log::info!("📡 Esplora URL: {}", esplora_url),
            AgentKind::Daemon => log::info!("🔗 RPC URL: {}", rpc_url),
        }

        let account = parse_or_default(&lookup, "WALLET_ACCOUNT", 0u32);
        let gap_limit = parse_or_default(&lookup, "WALLET_GAP_LIMIT", ADDRESS_GAP_LIMIT).max(1);
        let fee_per_kb = lookup("WALLET_FEE_PER_KB").and_then(|value| match value.parse::<u64>() {
            Ok(fee) => Some(fee),
            Err(_) => {
                log::warn!("⚠️  Invalid WALLET_FEE_PER_KB '{}', using coin default", value);
                None
            }
        });

        Self {
            coin,
            testnet,
            db_path: lookup("WALLET_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./wallet.db")),
            account,
            agent,
            esplora_url,
            rpc_url,
            rpc_user: lookup("RPC_USER").unwrap_or_default(),
            rpc_password: lookup("RPC_PASSWORD").unwrap_or_default(),
            fee_per_kb,
            gap_limit,
        }
    }

    /// Fee per kilobyte after applying the override
    pub fn effective_fee_per_kb(&self) -> u64 {
        self.fee_per_kb
            .filter(|fee| *fee > 0)
            .unwrap_or_else(|| self.coin.default_fee_per_kb())
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid {} '{}', defaulting to {}", key, value, default);
            default
        }),
    }
}

impl Default for WalletConfig {
    /// Default configuration (Bitcoin testnet, Esplora)
    fn default() -> Self {
        Self {
            coin: CoinType::Btc,
            testnet: true,
            db_path: PathBuf::from("./wallet.db"),
            account: 0,
            agent: AgentKind::Esplora,
            esplora_url: default_esplora_url(CoinType::Btc, true).to_string(),
            rpc_url: default_rpc_url(CoinType::Btc, true).to_string(),
            rpc_user: String::new(),
            rpc_password: String::new(),
            fee_per_kb: None,
            gap_limit: ADDRESS_GAP_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_is_btc_testnet() {
        let config = WalletConfig::default();
        assert_eq!(config.coin, CoinType::Btc);
        assert!(config.testnet);
        assert_eq!(config.agent, AgentKind::Esplora);
        assert_eq!(config.gap_limit, 5);
        assert_eq!(config.effective_fee_per_kb(), 20_000);
    }

    #[test]
    fn test_empty_environment_matches_default() {
        let config = WalletConfig::from_map(&HashMap::new());
        let default = WalletConfig::default();
        assert_eq!(config.coin, default.coin);
        assert_eq!(config.testnet, default.testnet);
        assert_eq!(config.esplora_url, default.esplora_url);
        assert_eq!(config.db_path, default.db_path);
    }

    #[test]
    fn test_litecoin_daemon() {
        let config = WalletConfig::from_map(&vars(&[
            ("WALLET_COIN", "ltc"),
            ("WALLET_NETWORK", "mainnet"),
            ("WALLET_AGENT", "daemon"),
            ("RPC_USER", "rpc"),
            ("RPC_PASSWORD", "secret"),
            ("WALLET_ACCOUNT", "3"),
        ]));
        assert_eq!(config.coin, CoinType::Ltc);
        assert!(!config.testnet);
        assert_eq!(config.agent, AgentKind::Daemon);
        assert_eq!(config.rpc_url, "http://127.0.0.1:9332");
        assert_eq!(config.account, 3);
        assert_eq!(config.effective_fee_per_kb(), 100_000);
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = WalletConfig::from_map(&vars(&[
            ("WALLET_COIN", "doge"),
            ("WALLET_NETWORK", "regtest"),
            ("WALLET_GAP_LIMIT", "lots"),
            ("WALLET_FEE_PER_KB", "-1"),
        ]));
        assert_eq!(config.coin, CoinType::Btc);
        assert!(config.testnet);
        assert_eq!(config.gap_limit, ADDRESS_GAP_LIMIT);
        assert_eq!(config.fee_per_kb, None);
    }

    #[test]
    fn test_fee_override() {
        let config = WalletConfig::from_map(&vars(&[("WALLET_FEE_PER_KB", "12000")]));
        assert_eq!(config.effective_fee_per_kb(), 12_000);

        let zero = WalletConfig {
            fee_per_kb: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.effective_fee_per_kb(), 20_000);
    }
}
