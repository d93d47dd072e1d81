//! Plain data shared by the ledger, agents and transaction builder

use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// An unspent output as stored in the ledger.
///
/// `tx_hash` is kept in internal (little-endian) byte order, i.e. reversed
/// relative to the hex txid shown by explorers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: Vec<u8>,
    pub output_index: u32,
    pub value: u64,
}

impl Utxo {
    pub fn new(tx_hash: Vec<u8>, output_index: u32, value: u64) -> Self {
        Self {
            tx_hash,
            output_index,
            value,
        }
    }

    /// Outpoint referenced by this output; the stored hash must be 32 bytes
    pub fn outpoint(&self) -> Result<OutPoint, WalletError> {
        let bytes: [u8; 32] = self.tx_hash.as_slice().try_into().map_err(|_| {
            WalletError::InvalidUtxo(format!(
                "tx hash is {} bytes, expected 32",
                self.tx_hash.len()
            ))
        })?;
        Ok(OutPoint {
            txid: Txid::from_byte_array(bytes),
            vout: self.output_index,
        })
    }
}

/// One payment requested from `CoinAccount::send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    pub amount: u64,
}

impl Recipient {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}
