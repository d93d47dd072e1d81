//! Base58check address decoding and locking scripts for recipients

use bitcoin::base58;
use bitcoin::hashes::Hash;
use bitcoin::{PubkeyHash, ScriptBuf, ScriptHash};

use crate::error::WalletError;
use crate::params::CoinParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    PubkeyHash,
    ScriptHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub kind: AddressKind,
    pub version: u8,
    pub hash: [u8; 20],
}

impl DecodedAddress {
    pub fn script_pubkey(&self) -> ScriptBuf {
        match self.kind {
            AddressKind::PubkeyHash => {
                ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(self.hash))
            }
            AddressKind::ScriptHash => {
                ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(self.hash))
            }
        }
    }
}

/// Decode `address` and check its version byte against `params`
pub fn decode_address(address: &str, params: &CoinParams) -> Result<DecodedAddress, WalletError> {
    let data = base58::decode_check(address)
        .map_err(|e| WalletError::InvalidAddress(format!("{}: {}", address, e)))?;

    if data.len() != 21 {
        return Err(WalletError::InvalidAddress(format!(
            "{}: payload is {} bytes, expected 21",
            address,
            data.len()
        )));
    }

    let version = data[0];
    let kind = if version == params.address_header {
        AddressKind::PubkeyHash
    } else if params.is_p2sh_header(version) {
        AddressKind::ScriptHash
    } else {
        return Err(WalletError::InvalidAddress(format!(
            "{}: version {} is not valid for {}",
            address, version, params.name
        )));
    };

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&data[1..]);
    Ok(DecodedAddress {
        kind,
        version,
        hash,
    })
}

/// Locking script paying to `address`
pub fn script_pubkey(address: &str, params: &CoinParams) -> Result<ScriptBuf, WalletError> {
    Ok(decode_address(address, params)?.script_pubkey())
}
