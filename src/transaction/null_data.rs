//! Zero-value OP_RETURN output carrying caller-supplied bytes

use bitcoin::script::{Instruction, PushBytesBuf};
use bitcoin::{Amount, ScriptBuf, Transaction, TxOut};

use crate::error::WalletError;

/// Largest payload relayed by standard nodes
pub const MAX_NULL_DATA_LEN: usize = 80;

pub fn null_data_output(data: &[u8]) -> Result<TxOut, WalletError> {
    if data.len() > MAX_NULL_DATA_LEN {
        return Err(WalletError::AuxDataTooLarge {
            size: data.len(),
            max: MAX_NULL_DATA_LEN,
        });
    }
    let push = PushBytesBuf::try_from(data.to_vec()).map_err(|_| WalletError::AuxDataTooLarge {
        size: data.len(),
        max: MAX_NULL_DATA_LEN,
    })?;

    Ok(TxOut {
        value: Amount::ZERO,
        script_pubkey: ScriptBuf::new_op_return(push),
    })
}

/// Payload of the first OP_RETURN output in `tx`, if any
pub fn extract_null_data(tx: &Transaction) -> Option<Vec<u8>> {
    let output = tx.output.iter().find(|o| o.script_pubkey.is_op_return())?;
    let mut instructions = output.script_pubkey.instructions();
    // skip OP_RETURN itself
    instructions.next();
    match instructions.next() {
        Some(Ok(Instruction::PushBytes(bytes))) => Some(bytes.as_bytes().to_vec()),
        _ => Some(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;

    #[test]
    fn test_null_data_output() {
        let output = null_data_output(b"hello").unwrap();
        assert_eq!(output.value, Amount::ZERO);
        assert!(output.script_pubkey.is_op_return());
        // OP_RETURN OP_PUSHBYTES_5 "hello"
        assert_eq!(output.script_pubkey.len(), 7);
    }

    #[test]
    fn test_payload_limit() {
        assert!(null_data_output(&[0xab; MAX_NULL_DATA_LEN]).is_ok());
        let result = null_data_output(&[0xab; MAX_NULL_DATA_LEN + 1]);
        assert!(matches!(
            result,
            Err(WalletError::AuxDataTooLarge { size: 81, max: 80 })
        ));
    }

    #[test]
    fn test_extract_null_data() {
        let tx = Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![null_data_output(&[1, 2, 3]).unwrap()],
        };
        assert_eq!(extract_null_data(&tx), Some(vec![1, 2, 3]));

        let empty = Transaction {
            output: vec![],
            ..tx
        };
        assert_eq!(extract_null_data(&empty), None);
    }
}
