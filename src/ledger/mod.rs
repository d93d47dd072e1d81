//! Persisted UTXO ledger
//!
//! - Binary codec for stored UTXO lists
//! - `UtxoLedger` trait, scoped to one account namespace
//! - sled-backed implementation

mod codec;
mod sled_store;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::types::Utxo;

pub use codec::{decode_utxos, encode_utxos, get_varint, put_varint, MAX_VARINT_LEN};
pub use sled_store::{open_db, open_temporary_db, SledLedger, LAST_INDEX_KEY};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl From<sled::Error> for LedgerError {
    fn from(e: sled::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// Durable address -> UTXO list mapping plus the account watermark
pub trait UtxoLedger {
    /// Highest derivation index known to be used on either chain (0 if never set)
    fn last_index(&self) -> Result<u32, LedgerError>;

    fn set_last_index(&self, index: u32) -> Result<(), LedgerError>;

    /// Stored UTXOs for `address`, empty if there is no record
    fn utxos(&self, address: &str) -> Result<Vec<Utxo>, LedgerError>;

    /// Replace the record for `address`; an empty list deletes it
    fn set_utxos(&self, address: &str, utxos: &[Utxo]) -> Result<(), LedgerError>;

    /// Every stored address record, excluding the watermark key
    fn all_utxos(&self) -> Result<BTreeMap<String, Vec<Utxo>>, LedgerError>;

    fn close(&self) -> Result<(), LedgerError>;
}
