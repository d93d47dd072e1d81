use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::secp256k1::{All, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, PublicKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use log::debug;

use super::signer::sign_transaction;
use crate::error::WalletError;
use crate::types::Utxo;

/// Serialized size of a P2PKH change output; change worth less than this
/// many bytes of fee is left to the miner.
pub const CHANGE_OUTPUT_COST_BYTES: u64 = 35;

/// A stored UTXO together with what is needed to spend it
#[derive(Debug, Clone)]
pub struct SpendableUtxo {
    pub utxo: Utxo,
    pub outpoint: OutPoint,
    pub address: String,
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub script_pubkey: ScriptBuf,
}

impl SpendableUtxo {
    pub fn new(
        utxo: Utxo,
        address: String,
        secret_key: SecretKey,
        public_key: PublicKey,
    ) -> Result<Self, WalletError> {
        let outpoint = utxo.outpoint()?;
        let script_pubkey = ScriptBuf::new_p2pkh(&public_key.pubkey_hash());
        Ok(Self {
            utxo,
            outpoint,
            address,
            secret_key,
            public_key,
            script_pubkey,
        })
    }

    pub fn value(&self) -> u64 {
        self.utxo.value
    }
}

/// A signed transaction ready for broadcast
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    pub tx: Transaction,
    pub requested: u64,
    pub total_input: u64,
    pub fee: u64,
    /// Value of the change output at index 0, if one was added
    pub change: Option<u64>,
    /// Input selections performed, 1 when the first selection covered the fee
    pub selection_rounds: u32,
}

impl BuiltTransaction {
    pub fn raw_hex(&self) -> String {
        serialize_hex(&self.tx)
    }

    pub fn txid(&self) -> String {
        self.tx.compute_txid().to_string()
    }

    pub fn size(&self) -> usize {
        self.tx.total_size()
    }
}

pub struct TransactionBuilder<'a> {
    secp: &'a Secp256k1<All>,
    fee_per_kb: u64,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(secp: &'a Secp256k1<All>, fee_per_kb: u64) -> Self {
        Self { secp, fee_per_kb }
    }

    pub fn fee_per_kb(&self) -> u64 {
        self.fee_per_kb
    }

    pub fn fee_for_size(&self, size: usize) -> u64 {
        size as u64 * self.fee_per_kb / 1000
    }

    /// Change at or below this value is not worth an output
    pub fn change_threshold(&self) -> u64 {
        CHANGE_OUTPUT_COST_BYTES * self.fee_per_kb / 1000
    }

    /// Select, fee-balance and sign a spend.
    ///
    /// `candidates` is the spend order; a prefix of it becomes the inputs.
    /// Recipient `outputs` keep their order, the optional `null_data` output
    /// goes last and a change output paying `change_script` goes first.
    pub fn build(
        &self,
        candidates: &[SpendableUtxo],
        outputs: Vec<TxOut>,
        null_data: Option<TxOut>,
        change_script: ScriptBuf,
    ) -> Result<BuiltTransaction, WalletError> {
        let requested = outputs.iter().try_fold(0u64, |sum, o| {
            sum.checked_add(o.value.to_sat())
                .ok_or_else(|| WalletError::AmountOverflow("sum of requested amounts".to_string()))
        })?;

        let mut payload = outputs;
        payload.extend(null_data);

        let mut selected = select_prefix(candidates, requested)?;
        let mut selection_rounds = 1;
        let mut tx = self.provisional(&candidates[..selected], &payload);
        sign_transaction(self.secp, &mut tx, &candidates[..selected])?;
        let mut basis = tx.total_size();
        let mut change = None;

        loop {
            let total_input = sum_values(&candidates[..selected])?;
            let fee = self.fee_for_size(tx.total_size());
            let needed = requested
                .checked_add(fee)
                .ok_or_else(|| WalletError::AmountOverflow("amount plus fee".to_string()))?;

            if total_input < needed {
                debug!(
                    "Inputs {} short of {} (fee {}), reselecting",
                    total_input, needed, fee
                );
                selected = select_prefix(candidates, needed)?;
                selection_rounds += 1;
                tx = self.provisional(&candidates[..selected], &payload);
                change = None;
                sign_transaction(self.secp, &mut tx, &candidates[..selected])?;
                basis = tx.total_size();
                continue;
            }

            let remainder = total_input - needed;
            if remainder > self.change_threshold() {
                let output = TxOut {
                    value: Amount::from_sat(remainder),
                    script_pubkey: change_script.clone(),
                };
                if change.is_some() {
                    tx.output[0] = output;
                } else {
                    tx.output.insert(0, output);
                }
                change = Some(remainder);
            } else if change.take().is_some() {
                tx.output.remove(0);
            }

            sign_transaction(self.secp, &mut tx, &candidates[..selected])?;
            let size = tx.total_size();
            debug!(
                "Fee round: size {} basis {} fee {} change {:?}",
                size, basis, fee, change
            );
            if size <= basis {
                let fee_paid = total_input - requested - change.unwrap_or(0);
                return Ok(BuiltTransaction {
                    tx,
                    requested,
                    total_input,
                    fee: fee_paid,
                    change,
                    selection_rounds,
                });
            }
            basis = size;
        }
    }

    fn provisional(&self, inputs: &[SpendableUtxo], outputs: &[TxOut]) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: inputs
                .iter()
                .map(|s| TxIn {
                    previous_output: s.outpoint,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: outputs.to_vec(),
        }
    }
}

fn sum_values(utxos: &[SpendableUtxo]) -> Result<u64, WalletError> {
    utxos.iter().try_fold(0u64, |sum, s| {
        sum.checked_add(s.value())
            .ok_or_else(|| WalletError::AmountOverflow("sum of inputs".to_string()))
    })
}

/// Length of the shortest candidate prefix worth at least `target` (never empty)
fn select_prefix(candidates: &[SpendableUtxo], target: u64) -> Result<usize, WalletError> {
    let mut total = 0u64;
    for (i, candidate) in candidates.iter().enumerate() {
        total = total.saturating_add(candidate.value());
        if total >= target {
            return Ok(i + 1);
        }
    }
    Err(WalletError::InsufficientFunds {
        required: target,
        available: total,
    })
}
