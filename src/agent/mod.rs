//! Blockchain data sources
//!
//! A `CoinAgent` answers "what are the unspent outputs of this address" and
//! relays raw transactions. Two backends: an Esplora HTTP indexer and a
//! coin daemon reached over JSON-RPC.

mod daemon;
mod esplora;

use std::str::FromStr;
use std::time::Duration;

use bitcoin::hashes::Hash;
use bitcoin::{Amount, Denomination, Txid};
use thiserror::Error;

use crate::config::{AgentKind, WalletConfig};
use crate::types::Utxo;

pub use daemon::DaemonAgent;
pub use esplora::EsploraAgent;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum AgentError {
    /// The address has never appeared in any transaction
    #[error("No transaction history for address {0}")]
    NoTransactionHistory(String),

    #[error("Query failed: {0}")]
    QueryFailure(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::QueryFailure(e.to_string())
    }
}

pub trait CoinAgent {
    /// Called once at the start of every discovery pass
    fn begin_discovery(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    /// Unspent outputs currently held by `address`.
    ///
    /// Returns `NoTransactionHistory` for an address that was never used,
    /// which is distinct from a used address with nothing unspent (`Ok(vec![])`).
    fn get_unspent_outputs(&mut self, address: &str) -> Result<Vec<Utxo>, AgentError>;

    /// Relay a hex-encoded transaction, returning its txid
    fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String, AgentError>;
}

/// Build the backend selected by `config`
pub fn build_agent(config: &WalletConfig) -> Result<Box<dyn CoinAgent>, AgentError> {
    match config.agent {
        AgentKind::Esplora => Ok(Box::new(EsploraAgent::new(config.esplora_url.clone())?)),
        AgentKind::Daemon => Ok(Box::new(DaemonAgent::new(
            config.rpc_url.clone(),
            config.rpc_user.clone(),
            config.rpc_password.clone(),
        )?)),
    }
}

/// Convert a coin amount reported as a float into minor units.
///
/// The value is rounded to eight decimals before parsing, so `1.15` becomes
/// exactly `115_000_000` even though its binary form is slightly below.
pub fn coins_to_minor_units(coins: f64) -> Result<u64, AgentError> {
    if !coins.is_finite() {
        return Err(AgentError::QueryFailure(format!(
            "amount {} is not a finite number",
            coins
        )));
    }
    let text = format!("{:.8}", coins);
    Amount::from_str_in(&text, Denomination::Bitcoin)
        .map(|amount| amount.to_sat())
        .map_err(|e| AgentError::QueryFailure(format!("invalid amount {}: {}", text, e)))
}

/// Hex txid as shown by explorers -> stored (internal order) bytes
pub fn txid_to_internal_bytes(txid: &str) -> Result<Vec<u8>, AgentError> {
    let txid = Txid::from_str(txid)
        .map_err(|e| AgentError::QueryFailure(format!("invalid txid {}: {}", txid, e)))?;
    Ok(txid.to_byte_array().to_vec())
}
