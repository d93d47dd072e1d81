//! Error types for wallet operations
//!
//! `WalletError` is what every public operation returns. Storage and
//! data-source failures keep their own enums (`LedgerError`, `AgentError`)
//! and convert into it with `?`.

use thiserror::Error;

use crate::agent::AgentError;
use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid mnemonic: {0}")]
    Mnemonic(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid UTXO: {0}")]
    InvalidUtxo(String),

    #[error("Auxiliary data is {size} bytes, at most {max} allowed")]
    AuxDataTooLarge { size: usize, max: usize },

    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    #[error("No coin agent is set for account {0}")]
    NoAgent(String),

    #[error("Broadcast failed: {source} (raw transaction: {raw_tx})")]
    Broadcast {
        raw_tx: String,
        #[source]
        source: AgentError,
    },
}

impl WalletError {
    /// Shortfall carried by an `InsufficientFunds` error
    pub fn shortfall(&self) -> Option<u64> {
        match self {
            WalletError::InsufficientFunds {
                required,
                available,
            } => Some(required.saturating_sub(*available)),
            _ => None,
        }
    }
}

impl From<bitcoin::bip32::Error> for WalletError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        WalletError::Derivation(e.to_string())
    }
}
