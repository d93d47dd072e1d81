//! Wallet and per-coin account orchestration
//!
//! A `Wallet` owns the seed and the ledger database. A `CoinAccount` binds
//! one `(coin, network, account index)` triple to its key subtree, its ledger
//! namespace and (once set) a data source.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use bip39::Mnemonic;
use bitcoin::{Amount, TxOut};
use log::{debug, info, warn};

use crate::address::script_pubkey;
use crate::agent::CoinAgent;
use crate::discover::{AddressScanner, DiscoveryReport, ADDRESS_GAP_LIMIT};
use crate::error::WalletError;
use crate::keys::{Chain, ExtendedKey, KeyDeriver, MAX_SEED_LEN, MIN_SEED_LEN};
use crate::ledger::{open_db, SledLedger, UtxoLedger};
use crate::params::{CoinParams, CoinType};
use crate::transaction::{null_data_output, BuiltTransaction, SpendableUtxo, TransactionBuilder};
use crate::types::{Recipient, Utxo};

/// Seed holder and ledger database shared by every account
pub struct Wallet {
    seed: Vec<u8>,
    db: sled::Db,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("seed", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Open (or create) the ledger database at `db_path`
    pub fn new(seed: Vec<u8>, db_path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let db = open_db(db_path)?;
        Self::with_db(seed, db)
    }

    /// Use an already opened database (e.g. a temporary one)
    pub fn with_db(seed: Vec<u8>, db: sled::Db) -> Result<Self, WalletError> {
        if seed.len() < MIN_SEED_LEN || seed.len() > MAX_SEED_LEN {
            return Err(WalletError::InvalidSeed(format!(
                "seed is {} bytes, expected {}..={}",
                seed.len(),
                MIN_SEED_LEN,
                MAX_SEED_LEN
            )));
        }
        Ok(Self { seed, db })
    }

    /// Seed from a BIP39 phrase and optional passphrase
    pub fn from_mnemonic(
        phrase: &str,
        passphrase: &str,
        db_path: impl AsRef<Path>,
    ) -> Result<Self, WalletError> {
        let mnemonic =
            Mnemonic::parse(phrase).map_err(|e| WalletError::Mnemonic(e.to_string()))?;
        Self::new(mnemonic.to_seed(passphrase).to_vec(), db_path)
    }

    /// Account handle, creating its ledger namespace if missing
    pub fn coin_account(
        &self,
        coin: CoinType,
        testnet: bool,
        account: u32,
    ) -> Result<CoinAccount, WalletError> {
        CoinAccount::open(&self.seed, coin, testnet, account, |id| {
            SledLedger::open(&self.db, id)
        })
    }

    /// Account handle for a namespace that must already exist
    pub fn existing_coin_account(
        &self,
        coin: CoinType,
        testnet: bool,
        account: u32,
    ) -> Result<CoinAccount, WalletError> {
        CoinAccount::open(&self.seed, coin, testnet, account, |id| {
            SledLedger::open_existing(&self.db, id)
        })
    }

    /// Flush the whole database
    pub fn close(&self) -> Result<(), WalletError> {
        self.db
            .flush()
            .map_err(|e| WalletError::Ledger(e.into()))?;
        Ok(())
    }
}

/// Outcome of a broadcast spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub txid: String,
    pub raw_tx: String,
    pub fee: u64,
    pub change: Option<u64>,
}

pub struct CoinAccount {
    coin: CoinType,
    params: &'static CoinParams,
    account: u32,
    deriver: KeyDeriver,
    account_key: ExtendedKey,
    identifier: String,
    fee_per_kb: u64,
    gap_limit: u32,
    ledger: Box<dyn UtxoLedger>,
    agent: Option<Box<dyn CoinAgent>>,
}

impl fmt::Display for CoinAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}

impl fmt::Debug for CoinAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinAccount")
            .field("coin", &self.coin)
            .field("network", &self.params.name)
            .field("account", &self.account)
            .field("identifier", &self.identifier)
            .field("fee_per_kb", &self.fee_per_kb)
            .finish_non_exhaustive()
    }
}

impl CoinAccount {
    /// Derive the account subtree and open its ledger.
    ///
    /// `open_ledger` receives the account identifier, which names the
    /// ledger namespace.
    pub fn open<L, F>(
        seed: &[u8],
        coin: CoinType,
        testnet: bool,
        account: u32,
        open_ledger: F,
    ) -> Result<Self, WalletError>
    where
        L: UtxoLedger + 'static,
        F: FnOnce(&str) -> Result<L, crate::ledger::LedgerError>,
    {
        let params = coin.params(testnet);
        let deriver = KeyDeriver::new(params);
        let account_key = deriver.account_key(seed, coin.bip44_index(), account)?;
        let identifier = deriver.key_address(&account_key);
        let ledger = open_ledger(&identifier)?;

        info!(
            "Opened {} account {} on {} ({})",
            coin, account, params.name, identifier
        );

        Ok(Self {
            coin,
            params,
            account,
            deriver,
            account_key,
            identifier,
            fee_per_kb: coin.default_fee_per_kb(),
            gap_limit: ADDRESS_GAP_LIMIT,
            ledger: Box::new(ledger),
            agent: None,
        })
    }

    pub fn coin(&self) -> CoinType {
        self.coin
    }

    pub fn params(&self) -> &'static CoinParams {
        self.params
    }

    pub fn account_index(&self) -> u32 {
        self.account
    }

    /// Ledger namespace: the P2PKH address of the account public key
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn fee_per_kb(&self) -> u64 {
        self.fee_per_kb
    }

    /// Zero restores the coin default
    pub fn set_fee_per_kb(&mut self, fee_per_kb: u64) {
        self.fee_per_kb = if fee_per_kb == 0 {
            self.coin.default_fee_per_kb()
        } else {
            fee_per_kb
        };
    }

    pub fn gap_limit(&self) -> u32 {
        self.gap_limit
    }

    pub fn set_gap_limit(&mut self, gap_limit: u32) {
        self.gap_limit = gap_limit.max(1);
    }

    pub fn set_agent(&mut self, agent: Box<dyn CoinAgent>) {
        self.agent = Some(agent);
    }

    pub fn last_index(&self) -> Result<u32, WalletError> {
        Ok(self.ledger.last_index()?)
    }

    pub fn address(&self, index: u32, chain: Chain) -> Result<String, WalletError> {
        let key = self.deriver.address_key(&self.account_key, chain, index)?;
        Ok(self.deriver.key_address(&key))
    }

    /// External address one past the watermark; not persisted
    pub fn new_external_address(&self) -> Result<String, WalletError> {
        self.address(self.next_index()?, Chain::External)
    }

    /// Internal address one past the watermark; not persisted
    pub fn new_change_address(&self) -> Result<String, WalletError> {
        self.address(self.next_index()?, Chain::Internal)
    }

    fn next_index(&self) -> Result<u32, WalletError> {
        self.last_index()?
            .checked_add(1)
            .ok_or_else(|| WalletError::Derivation("address index exhausted".to_string()))
    }

    /// Rescan both chains against the agent and refresh the ledger
    pub fn discover(&mut self) -> Result<DiscoveryReport, WalletError> {
        let agent = self
            .agent
            .as_deref_mut()
            .ok_or_else(|| WalletError::NoAgent(self.identifier.clone()))?;

        AddressScanner::new(&self.deriver, &self.account_key)
            .with_gap_limit(self.gap_limit)
            .scan(agent, self.ledger.as_ref())
    }

    /// Every stored address record
    pub fn utxos(&self) -> Result<BTreeMap<String, Vec<Utxo>>, WalletError> {
        Ok(self.ledger.all_utxos()?)
    }

    /// Sum of all stored UTXO values
    pub fn balance(&self) -> Result<u64, WalletError> {
        self.utxos()?
            .values()
            .flatten()
            .try_fold(0u64, |sum, utxo| sum.checked_add(utxo.value))
            .ok_or_else(|| WalletError::AmountOverflow("balance".to_string()))
    }

    /// Stored UTXOs in spend order: internal chain, then external, index ascending
    pub fn spend_candidates(&self) -> Result<Vec<SpendableUtxo>, WalletError> {
        let last_index = self.last_index()?;
        let mut candidates = Vec::new();

        for chain in [Chain::Internal, Chain::External] {
            for index in 0..=last_index {
                let key = self.deriver.address_key(&self.account_key, chain, index)?;
                let public_key = self.deriver.public_key(&key);
                let address = self.deriver.address(&public_key);
                for utxo in self.ledger.utxos(&address)? {
                    candidates.push(SpendableUtxo::new(
                        utxo,
                        address.clone(),
                        key.private_key,
                        public_key,
                    )?);
                }
            }
        }

        Ok(candidates)
    }

    /// Select, fee-balance and sign a spend without broadcasting it.
    ///
    /// `fee_per_kb` of `None` or zero uses the account's fee.
    pub fn build_transaction(
        &self,
        recipients: &[Recipient],
        aux_data: Option<&[u8]>,
        fee_per_kb: Option<u64>,
    ) -> Result<BuiltTransaction, WalletError> {
        let fee_per_kb = fee_per_kb
            .filter(|fee| *fee > 0)
            .unwrap_or(self.fee_per_kb);

        let outputs = recipients
            .iter()
            .map(|r| {
                Ok(TxOut {
                    value: Amount::from_sat(r.amount),
                    script_pubkey: script_pubkey(&r.address, self.params)?,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;

        let null_data = match aux_data {
            Some(data) if !data.is_empty() => {
                debug!("Null-data payload: {}", hex::encode(data));
                Some(null_data_output(data)?)
            }
            _ => None,
        };

        let change_address = self.new_change_address()?;
        let change_script = script_pubkey(&change_address, self.params)?;
        let candidates = self.spend_candidates()?;

        let built = TransactionBuilder::new(self.deriver.secp(), fee_per_kb).build(
            &candidates,
            outputs,
            null_data,
            change_script,
        )?;

        info!(
            "Built transaction {}: {} inputs, {} outputs, fee {}, change {:?} to {}",
            built.txid(),
            built.tx.input.len(),
            built.tx.output.len(),
            built.fee,
            built.change,
            change_address
        );
        Ok(built)
    }

    /// Build, sign and broadcast a spend
    pub fn send(
        &self,
        recipients: &[Recipient],
        aux_data: Option<&[u8]>,
        fee_per_kb: Option<u64>,
    ) -> Result<SendReceipt, WalletError> {
        let agent = self
            .agent
            .as_deref()
            .ok_or_else(|| WalletError::NoAgent(self.identifier.clone()))?;

        let built = self.build_transaction(recipients, aux_data, fee_per_kb)?;
        let raw_tx = built.raw_hex();

        match agent.broadcast_transaction(&raw_tx) {
            Ok(txid) => {
                info!("Broadcast transaction {}", txid);
                Ok(SendReceipt {
                    txid,
                    raw_tx,
                    fee: built.fee,
                    change: built.change,
                })
            }
            Err(source) => {
                warn!("Broadcast failed: {} (raw transaction: {})", source, raw_tx);
                Err(WalletError::Broadcast { raw_tx, source })
            }
        }
    }

    /// Account-level extended public key (`xpub`/`tpub`)
    pub fn export_account_xpub(&self) -> String {
        self.deriver.export_public(&self.account_key)
    }

    /// Flush the ledger namespace
    pub fn close(&self) -> Result<(), WalletError> {
        Ok(self.ledger.close()?)
    }
}
