//! coin-wallet: HD multi-coin wallet core
//!
//! Derives per-address signing keys from a single seed (BIP44), discovers
//! which derived addresses hold funds by gap-limited scanning against a
//! blockchain data source, persists the resulting UTXO set, and builds,
//! fee-balances and signs P2PKH spend transactions from that set.
//!
//! # Architecture
//!
//! - **KeyDeriver**: `m/44'/coin'/account'/chain/index` key tree
//! - **UtxoLedger**: sled-backed address -> UTXO map plus the last-index watermark
//! - **AddressScanner**: gap-limit discovery over the external and internal chains
//! - **TransactionBuilder**: input selection, fee/size fixed point, change policy, signing
//! - **CoinAccount**: orchestrates the above for one coin/network/account
//!
//! # Example
//!
//! ```no_run
//! use coin_wallet::{CoinType, Recipient, Wallet};
//! use coin_wallet::agent::EsploraAgent;
//!
//! # fn example(seed: Vec<u8>) -> coin_wallet::Result<()> {
//! let wallet = Wallet::new(seed, "wallet.db")?;
//! let mut account = wallet.coin_account(CoinType::Btc, true, 0)?;
//! account.set_agent(Box::new(EsploraAgent::new("https://mempool.space/testnet/api")?));
//!
//! account.discover()?;
//! println!("balance: {}", account.balance()?);
//!
//! let receipt = account.send(
//!     &[Recipient::new("mkeFURLRyDugRRP1kwKRcNBZwkVCPPmYkt", 50_000)],
//!     None,
//!     None,
//! )?;
//! println!("broadcast {}", receipt.txid);
//! account.close()?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod address;
pub mod agent;
pub mod config;
pub mod discover;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod params;
pub mod transaction;
pub mod types;

pub use account::{CoinAccount, SendReceipt, Wallet};
pub use agent::{AgentError, CoinAgent};
pub use config::WalletConfig;
pub use discover::{AddressScanner, ChainScan, DiscoveryReport, ADDRESS_GAP_LIMIT};
pub use error::WalletError;
pub use keys::{Chain, ExtendedKey, KeyDeriver};
pub use ledger::{LedgerError, SledLedger, UtxoLedger};
pub use params::{CoinParams, CoinType};
pub use transaction::{BuiltTransaction, SpendableUtxo, TransactionBuilder};
pub use types::{Recipient, Utxo};

// Common result type
pub type Result<T> = std::result::Result<T, WalletError>;
