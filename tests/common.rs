//! Common test utilities for coin-wallet integration tests
//!
//! - Scripted in-memory `CoinAgent` that records every call
//! - Wallets over a temporary or on-disk sled database
//! - Fixture seed and derived addresses
//! - P2PKH script-sig verification

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use bitcoin::consensus::encode::deserialize;
use bitcoin::hashes::Hash;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{ecdsa, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PublicKey, ScriptBuf, Transaction};
use coin_wallet::ledger::open_temporary_db;
use coin_wallet::{AgentError, CoinAgent, Utxo, Wallet};

/// BIP32 seed used across the suite
pub const SEED_HEX: &str = "fded5e8970380eef15f742348d28511111366ae6a55188402b16c69922006fe6";

/// Bitcoin testnet, account 0: external chain indices 0..=3
pub const BTC_TEST_EXTERNAL: [&str; 4] = [
    "mrPpdSCzGT25wD4Jmnv4umr8JcdRG24bQK",
    "mtTBNyr5qFsuuHdLAGMzAa7gxdrxtGE1gr",
    "msKPNgsAzmruLkBzsQUHCkfSKeDFC7WEz1",
    "n1pFJdpD5DEtuEvYrjbfFE8SqdxjszwnQh",
];

/// Bitcoin testnet, account 0: internal chain indices 0..=3
pub const BTC_TEST_INTERNAL: [&str; 4] = [
    "mhwSoJpLp2rdCpJ7ibGE2nvA2uuYf1HCpV",
    "mmcLCZqNxKCeEaY7URETZ9pYJ2JY6Yp1yc",
    "n1eUh7h1wJwXAqnup7XP1weXmKXhWCRKLy",
    "mi7mgnfy7mdpNcmPPD4Y4iy4D7s8jxG8cs",
];

/// An address outside the wallet
pub const FOREIGN_TEST_ADDRESS: &str = "mkeFURLRyDugRRP1kwKRcNBZwkVCPPmYkt";

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

pub fn seed() -> Vec<u8> {
    hex::decode(SEED_HEX).expect("fixture seed is valid hex")
}

pub fn test_wallet() -> Wallet {
    init_logging();
    Wallet::with_db(seed(), open_temporary_db().expect("temporary sled db"))
        .expect("fixture seed is valid")
}

pub fn wallet_at(path: &Path) -> Wallet {
    init_logging();
    Wallet::new(seed(), path).expect("open on-disk wallet")
}

/// 32-byte tx hash filled with `byte`
pub fn tx_hash(byte: u8) -> Vec<u8> {
    vec![byte; 32]
}

/// What the mock agent saw
#[derive(Debug, Default)]
pub struct AgentLog {
    pub begin_calls: u32,
    pub queries: Vec<String>,
    pub broadcasts: Vec<String>,
}

enum Reply {
    Unspent(Vec<Utxo>),
    Fail,
}

/// Scripted agent: unknown addresses have no history
pub struct MockAgent {
    replies: HashMap<String, Reply>,
    reject_broadcast: bool,
    log: Arc<Mutex<AgentLog>>,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            reject_broadcast: false,
            log: Arc::new(Mutex::new(AgentLog::default())),
        }
    }

    /// `address` has history; `utxos` may be empty
    pub fn with_utxos(mut self, address: &str, utxos: Vec<Utxo>) -> Self {
        self.replies
            .insert(address.to_string(), Reply::Unspent(utxos));
        self
    }

    /// Queries for `address` fail with `QueryFailure`
    pub fn failing_on(mut self, address: &str) -> Self {
        self.replies.insert(address.to_string(), Reply::Fail);
        self
    }

    pub fn rejecting_broadcasts(mut self) -> Self {
        self.reject_broadcast = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<AgentLog>> {
        Arc::clone(&self.log)
    }
}

impl CoinAgent for MockAgent {
    fn begin_discovery(&mut self) -> Result<(), AgentError> {
        self.log.lock().unwrap().begin_calls += 1;
        Ok(())
    }

    fn get_unspent_outputs(&mut self, address: &str) -> Result<Vec<Utxo>, AgentError> {
        self.log.lock().unwrap().queries.push(address.to_string());
        match self.replies.get(address) {
            None => Err(AgentError::NoTransactionHistory(address.to_string())),
            Some(Reply::Unspent(utxos)) => Ok(utxos.clone()),
            Some(Reply::Fail) => Err(AgentError::QueryFailure(format!(
                "backend unavailable for {}",
                address
            ))),
        }
    }

    fn broadcast_transaction(&self, raw_tx_hex: &str) -> Result<String, AgentError> {
        self.log
            .lock()
            .unwrap()
            .broadcasts
            .push(raw_tx_hex.to_string());
        if self.reject_broadcast {
            return Err(AgentError::QueryFailure("txn-mempool-conflict".to_string()));
        }
        let bytes = hex::decode(raw_tx_hex).map_err(|e| AgentError::QueryFailure(e.to_string()))?;
        let tx: Transaction =
            deserialize(&bytes).map_err(|e| AgentError::QueryFailure(e.to_string()))?;
        Ok(tx.compute_txid().to_string())
    }
}

/// Queried addresses that are not in `known`
pub fn unknown_queries(log: &AgentLog, known: &HashSet<&str>) -> usize {
    log.queries
        .iter()
        .filter(|q| !known.contains(q.as_str()))
        .count()
}

/// Check input `index` carries a valid SIGHASH_ALL signature for `script_pubkey`
pub fn verify_p2pkh_input(tx: &Transaction, index: usize, script_pubkey: &ScriptBuf) {
    let mut pushes = tx.input[index]
        .script_sig
        .instructions()
        .map(|i| match i.expect("valid script-sig") {
            Instruction::PushBytes(bytes) => bytes.as_bytes().to_vec(),
            other => panic!("unexpected opcode in script-sig: {:?}", other),
        });
    let sig = pushes.next().expect("signature push");
    let pubkey = pushes.next().expect("pubkey push");
    assert!(pushes.next().is_none());

    assert_eq!(*sig.last().unwrap(), EcdsaSighashType::All.to_u32() as u8);
    let public_key = PublicKey::from_slice(&pubkey).expect("compressed pubkey");
    assert!(public_key.compressed);
    assert_eq!(
        &ScriptBuf::new_p2pkh(&public_key.pubkey_hash()),
        script_pubkey
    );

    let sighash = SighashCache::new(tx)
        .legacy_signature_hash(index, script_pubkey, EcdsaSighashType::All.to_u32())
        .expect("sighash");
    let message = Message::from_digest(sighash.to_byte_array());
    let signature = ecdsa::Signature::from_der(&sig[..sig.len() - 1]).expect("DER signature");
    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key.inner)
        .expect("signature verifies");
}

/// Decode a raw hex transaction
pub fn decode_tx(raw_tx_hex: &str) -> Transaction {
    deserialize(&hex::decode(raw_tx_hex).expect("hex")).expect("transaction")
}
