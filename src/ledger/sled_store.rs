use std::collections::BTreeMap;
use std::path::Path;

use log::debug;

use super::codec::{decode_utxos, encode_utxos, get_varint, put_varint};
use super::{LedgerError, UtxoLedger};
use crate::types::Utxo;

/// Reserved key holding the watermark in every account tree
pub const LAST_INDEX_KEY: &str = "lastIndex";

/// Open or create the ledger database at `path`
pub fn open_db(path: impl AsRef<Path>) -> Result<sled::Db, LedgerError> {
    Ok(sled::open(path.as_ref())?)
}

/// In-memory database removed on drop (for testing)
pub fn open_temporary_db() -> Result<sled::Db, LedgerError> {
    Ok(sled::Config::new().temporary(true).open()?)
}

/// Ledger for one account, stored as a sled tree named after the account identifier
pub struct SledLedger {
    account: String,
    tree: sled::Tree,
}

impl SledLedger {
    /// Open the account tree, creating it (with watermark 0) if missing
    pub fn open(db: &sled::Db, account: &str) -> Result<Self, LedgerError> {
        let tree = db.open_tree(account)?;
        if tree.get(LAST_INDEX_KEY)?.is_none() {
            debug!("Creating ledger namespace for account {}", account);
            let mut buf = Vec::new();
            put_varint(&mut buf, 0);
            tree.insert(LAST_INDEX_KEY, buf)?;
        }
        Ok(Self {
            account: account.to_string(),
            tree,
        })
    }

    /// Open an account tree that must already exist
    pub fn open_existing(db: &sled::Db, account: &str) -> Result<Self, LedgerError> {
        let exists = db
            .tree_names()
            .iter()
            .any(|name| name.as_ref() == account.as_bytes());
        if !exists {
            return Err(LedgerError::AccountNotFound(account.to_string()));
        }
        Self::open(db, account)
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl UtxoLedger for SledLedger {
    fn last_index(&self) -> Result<u32, LedgerError> {
        match self.tree.get(LAST_INDEX_KEY)? {
            None => Ok(0),
            Some(bytes) => {
                let (value, _) = get_varint(&bytes)?;
                u32::try_from(value).map_err(|_| {
                    LedgerError::Corrupted(format!("last index {} out of range", value))
                })
            }
        }
    }

    fn set_last_index(&self, index: u32) -> Result<(), LedgerError> {
        let mut buf = Vec::new();
        put_varint(&mut buf, index as u64);
        self.tree.insert(LAST_INDEX_KEY, buf)?;
        Ok(())
    }

    fn utxos(&self, address: &str) -> Result<Vec<Utxo>, LedgerError> {
        match self.tree.get(address)? {
            None => Ok(Vec::new()),
            Some(bytes) => decode_utxos(&bytes),
        }
    }

    fn set_utxos(&self, address: &str, utxos: &[Utxo]) -> Result<(), LedgerError> {
        if utxos.is_empty() {
            self.tree.remove(address)?;
        } else {
            self.tree.insert(address, encode_utxos(utxos))?;
        }
        Ok(())
    }

    fn all_utxos(&self) -> Result<BTreeMap<String, Vec<Utxo>>, LedgerError> {
        let mut records = BTreeMap::new();
        for item in self.tree.iter() {
            let (key, value) = item?;
            if key.as_ref() == LAST_INDEX_KEY.as_bytes() {
                continue;
            }
            let address = String::from_utf8(key.to_vec())
                .map_err(|_| LedgerError::Corrupted("non-UTF-8 address key".to_string()))?;
            records.insert(address, decode_utxos(&value)?);
        }
        Ok(records)
    }

    fn close(&self) -> Result<(), LedgerError> {
        self.tree.flush()?;
        Ok(())
    }
}
