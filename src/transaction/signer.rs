//! Legacy P2PKH input signing

use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::Transaction;

use super::builder::SpendableUtxo;
use crate::error::WalletError;

/// Fill every input's script-sig with `<DER sig || SIGHASH_ALL> <compressed pubkey>`.
///
/// Each input is matched to its key through its outpoint. Low-R signatures
/// keep the script-sig length stable between signing rounds.
pub fn sign_transaction(
    secp: &Secp256k1<All>,
    tx: &mut Transaction,
    spendables: &[SpendableUtxo],
) -> Result<(), WalletError> {
    let mut script_sigs = Vec::with_capacity(tx.input.len());

    {
        let cache = SighashCache::new(&*tx);
        for (input_index, input) in tx.input.iter().enumerate() {
            let spendable = spendables
                .iter()
                .find(|s| s.outpoint == input.previous_output)
                .ok_or_else(|| {
                    WalletError::Signing(format!(
                        "no key for input {} ({})",
                        input_index, input.previous_output
                    ))
                })?;

            let sighash = cache
                .legacy_signature_hash(
                    input_index,
                    &spendable.script_pubkey,
                    EcdsaSighashType::All.to_u32(),
                )
                .map_err(|e| WalletError::Signing(e.to_string()))?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa_low_r(&message, &spendable.secret_key);

            let mut sig_with_hashtype = signature.serialize_der().to_vec();
            sig_with_hashtype.push(EcdsaSighashType::All.to_u32() as u8);
            let sig_push = PushBytesBuf::try_from(sig_with_hashtype)
                .map_err(|e| WalletError::Signing(e.to_string()))?;

            let script_sig = Builder::new()
                .push_slice(sig_push)
                .push_key(&spendable.public_key)
                .into_script();
            script_sigs.push(script_sig);
        }
    }

    for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
        input.script_sig = script_sig;
    }

    Ok(())
}
